// Domain layer: transient models and the ports the tasks are written against.

pub mod model;
pub mod ports;
