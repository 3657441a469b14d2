// Application layer: the concrete remote operations.

pub mod tasks;
