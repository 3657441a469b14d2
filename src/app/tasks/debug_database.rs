use super::exec_step;
use crate::config::DiagnosticsConfig;
use crate::core::mysql::{like_escape, sql_literal, MysqlCli};
use crate::domain::model::TaskReport;
use crate::domain::ports::{RemoteSession, Task};
use crate::utils::error::Result;
use async_trait::async_trait;

pub struct DebugDatabaseTask {
    mysql: MysqlCli,
    diagnostics: DiagnosticsConfig,
}

impl DebugDatabaseTask {
    pub fn new(mysql: MysqlCli, diagnostics: DiagnosticsConfig) -> Self {
        Self { mysql, diagnostics }
    }

    /// The diagnostic queries, in the order they are printed.
    pub fn queries(&self) -> Vec<(String, String)> {
        let d = &self.diagnostics;
        let keyword = like_escape(&d.keyword);

        vec![
            (
                format!("Checking for {} service", d.service_slug),
                format!(
                    "SELECT id, name, slug, category_id FROM services WHERE slug = {} LIMIT 5;",
                    sql_literal(&d.service_slug)
                ),
            ),
            (
                format!("Checking for {} category", d.category_slug),
                format!(
                    "SELECT id, name, slug FROM service_categories WHERE slug = {};",
                    sql_literal(&d.category_slug)
                ),
            ),
            (
                format!("Checking all {}-related services", d.keyword.to_uppercase()),
                format!(
                    "SELECT s.id, s.name, s.slug, c.slug as category_slug FROM services s \
                     JOIN service_categories c ON s.category_id = c.id \
                     WHERE s.slug LIKE {} OR s.name LIKE {} LIMIT 10;",
                    sql_literal(&format!("%{}%", keyword.to_lowercase())),
                    sql_literal(&format!("%{}%", keyword.to_uppercase()))
                ),
            ),
            (
                format!("Checking features table for service ID {}", d.feature_service_id),
                format!(
                    "SELECT COUNT(*) as feature_count FROM features WHERE service_id = {};",
                    d.feature_service_id
                ),
            ),
        ]
    }
}

#[async_trait]
impl Task for DebugDatabaseTask {
    fn name(&self) -> &'static str {
        "debug-db"
    }

    async fn run(&self, session: &dyn RemoteSession, report: &mut TaskReport) -> Result<()> {
        tracing::info!("Debugging database queries...");

        for (label, sql) in self.queries() {
            let command = self.mysql.query(&sql);
            let masked = self.mysql.redacted(&command);
            let output = exec_step(session, report, &label, &command, masked).await?;
            // A failing query is printed; the rest still run.
            if !output.success() {
                report.fail();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    fn task(diagnostics: DiagnosticsConfig) -> DebugDatabaseTask {
        let mysql = MysqlCli::new(DatabaseConfig {
            user: "app".to_string(),
            password: "pw".to_string(),
            host: "127.0.0.1".to_string(),
            port: None,
            name: "appdb".to_string(),
        });
        DebugDatabaseTask::new(mysql, diagnostics)
    }

    #[test]
    fn test_default_queries() {
        let queries = task(DiagnosticsConfig::default()).queries();
        assert_eq!(queries.len(), 4);

        assert_eq!(
            queries[0].1,
            "SELECT id, name, slug, category_id FROM services WHERE slug = 'search-engine-optimization' LIMIT 5;"
        );
        assert!(queries[2].1.contains("WHERE s.slug LIKE '%seo%' OR s.name LIKE '%SEO%' LIMIT 10;"));
        assert_eq!(
            queries[3].1,
            "SELECT COUNT(*) as feature_count FROM features WHERE service_id = 133;"
        );
        assert_eq!(queries[3].0, "Checking features table for service ID 133");
    }

    #[test]
    fn test_keyword_is_escaped() {
        let diagnostics = DiagnosticsConfig {
            keyword: "it's_%".to_string(),
            ..DiagnosticsConfig::default()
        };
        let queries = task(diagnostics).queries();
        assert!(queries[2].1.contains(r"LIKE '%it''s\\_\\%%'"));
    }
}
