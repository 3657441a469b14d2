use super::exec_step;
use crate::core::mysql::{parse_single_id, sql_literal, MysqlCli};
use crate::domain::model::{CommandOutput, ServiceDefinition, StepOutcome, TaskReport};
use crate::domain::ports::{RemoteSession, Task};
use crate::utils::error::{OpsError, Result};
use async_trait::async_trait;

/// Looks up the category, upserts the service row and reads it back.
pub struct CreateServiceTask {
    mysql: MysqlCli,
    service: ServiceDefinition,
}

impl CreateServiceTask {
    pub fn new(mysql: MysqlCli, service: ServiceDefinition) -> Self {
        Self { mysql, service }
    }

    pub fn category_query(&self) -> String {
        format!(
            "SELECT id FROM service_categories WHERE slug = {};",
            sql_literal(&self.service.category_slug)
        )
    }

    pub fn upsert_statement(&self, category_id: u64) -> String {
        let s = &self.service;
        format!(
            "INSERT INTO services (name, slug, description, category_id, is_active, sort_order) \
             VALUES ({}, {}, {}, {}, {}, {}) ON DUPLICATE KEY UPDATE name=VALUES(name);",
            sql_literal(&s.name),
            sql_literal(&s.slug),
            sql_literal(&s.description),
            category_id,
            u8::from(s.is_active),
            s.sort_order
        )
    }

    pub fn verify_query(&self) -> String {
        format!(
            "SELECT id, name, slug FROM services WHERE slug = {};",
            sql_literal(&self.service.slug)
        )
    }

    async fn run_sql(
        &self,
        session: &dyn RemoteSession,
        report: &mut TaskReport,
        label: &str,
        command: String,
    ) -> Result<CommandOutput> {
        let masked = self.mysql.redacted(&command);
        exec_step(session, report, label, &command, masked).await
    }
}

#[async_trait]
impl Task for CreateServiceTask {
    fn name(&self) -> &'static str {
        "create-service"
    }

    async fn run(&self, session: &dyn RemoteSession, report: &mut TaskReport) -> Result<()> {
        tracing::info!("Creating missing '{}' service...", self.service.slug);

        let lookup = self
            .run_sql(
                session,
                report,
                "Category query",
                self.mysql.batch_query(&self.category_query()),
            )
            .await?;

        if !lookup.success() {
            report.fail();
            return Err(OpsError::CommandFailed {
                step: "Category query".to_string(),
                exit_status: lookup.exit_status,
                stderr: lookup.stderr.trim().to_string(),
            });
        }

        let category_id = match parse_single_id(&lookup.stdout) {
            Some(id) => id,
            None if session.is_dry_run() => {
                report.push(StepOutcome::note(
                    "Category id",
                    "dry run: category id unknown, planning with 0",
                ));
                0
            }
            None => {
                let note = format!(
                    "no category with slug '{}', nothing inserted",
                    self.service.category_slug
                );
                report.push(StepOutcome::note("Category id", note));
                return Err(OpsError::NotFound {
                    what: format!("category '{}'", self.service.category_slug),
                });
            }
        };
        tracing::debug!("category '{}' has id {}", self.service.category_slug, category_id);

        let insert = self
            .run_sql(
                session,
                report,
                "Insert service",
                self.mysql.query(&self.upsert_statement(category_id)),
            )
            .await?;
        if !insert.success() {
            report.fail();
        }

        self.run_sql(
            session,
            report,
            "Verification",
            self.mysql.query(&self.verify_query()),
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    fn task() -> CreateServiceTask {
        let mysql = MysqlCli::new(DatabaseConfig {
            user: "app".to_string(),
            password: "pw".to_string(),
            host: "127.0.0.1".to_string(),
            port: None,
            name: "appdb".to_string(),
        });
        CreateServiceTask::new(mysql, ServiceDefinition::default())
    }

    #[test]
    fn test_upsert_statement_matches_original_row() {
        let sql = task().upsert_statement(4);
        assert_eq!(
            sql,
            "INSERT INTO services (name, slug, description, category_id, is_active, sort_order) \
             VALUES ('Search Engine Optimization', 'search-engine-optimization', \
             'Professional search engine optimization services with industry-leading expertise and proven results.', \
             4, 1, 1) ON DUPLICATE KEY UPDATE name=VALUES(name);"
        );
    }

    #[test]
    fn test_queries_use_slugs() {
        let task = task();
        assert_eq!(
            task.category_query(),
            "SELECT id FROM service_categories WHERE slug = 'digital-marketing-seo';"
        );
        assert_eq!(
            task.verify_query(),
            "SELECT id, name, slug FROM services WHERE slug = 'search-engine-optimization';"
        );
    }

    #[test]
    fn test_inactive_service_is_zero() {
        let mut task = task();
        task.service.is_active = false;
        task.service.name = "Bob's SEO".to_string();
        let sql = task.upsert_statement(9);
        assert!(sql.contains("'Bob''s SEO'"));
        assert!(sql.contains(", 9, 0, 1)"));
    }
}
