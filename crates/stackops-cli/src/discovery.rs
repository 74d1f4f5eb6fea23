//! Target discovery: running containers and loaded services.

use serde::Deserialize;

use stackops_logsource::process::ProcessRunner;
use stackops_logsource::TargetId;

pub const DOCKER_BINARY: &str = "docker";
pub const SYSTEMCTL_BINARY: &str = "systemctl";

#[derive(Debug, Deserialize)]
struct ContainerRow {
    #[serde(rename = "Names", default)]
    names: String,
}

#[derive(Debug, Deserialize)]
struct UnitRow {
    #[serde(default)]
    unit: String,
}

/// Parse `docker ps --format '{{json .}}'`: one JSON object per line.
/// Rows that do not parse are skipped.
pub fn parse_container_list(output: &str) -> Vec<TargetId> {
    let mut targets: Vec<TargetId> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<ContainerRow>(line).ok())
        .filter_map(|row| {
            // Multiple names are comma separated; the first is canonical.
            let name = row.names.split(',').next().unwrap_or_default().trim().to_owned();
            (!name.is_empty()).then(|| TargetId::container(name))
        })
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

/// Parse `systemctl list-units --type=service --output=json`.
pub fn parse_service_list(output: &str) -> Vec<TargetId> {
    let rows: Vec<UnitRow> = match serde_json::from_str(output.trim()) {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable systemctl output");
            return Vec::new();
        }
    };
    let mut targets: Vec<TargetId> = rows
        .into_iter()
        .map(|row| row.unit.trim().to_owned())
        .filter(|unit| unit.ends_with(".service"))
        .map(TargetId::service)
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

/// List containers, then services. A provider that is missing or failing
/// contributes nothing.
pub async fn discover_targets(runner: &dyn ProcessRunner) -> Vec<TargetId> {
    let mut targets = Vec::new();

    let docker_args = ["ps".to_owned(), "--format".to_owned(), "{{json .}}".to_owned()];
    match runner.run(DOCKER_BINARY, &docker_args).await {
        Ok(stdout) => targets.extend(parse_container_list(&String::from_utf8_lossy(&stdout))),
        Err(err) => tracing::warn!(error = %err, "container discovery failed"),
    }

    let systemctl_args = [
        "list-units".to_owned(),
        "--type=service".to_owned(),
        "--output=json".to_owned(),
        "--no-pager".to_owned(),
    ];
    match runner.run(SYSTEMCTL_BINARY, &systemctl_args).await {
        Ok(stdout) => targets.extend(parse_service_list(&String::from_utf8_lossy(&stdout))),
        Err(err) => tracing::warn!(error = %err, "service discovery failed"),
    }

    tracing::info!(count = targets.len(), "discovered log targets");
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stackops_logsource::LogSourceError;

    #[test]
    fn container_list_uses_first_name_and_skips_garbage() {
        let output = concat!(
            "{\"ID\":\"a1\",\"Names\":\"web,web-alias\",\"State\":\"running\"}\n",
            "not json\n",
            "\n",
            "{\"ID\":\"b2\",\"Names\":\"db\"}\n",
        );
        assert_eq!(
            parse_container_list(output),
            vec![TargetId::container("db"), TargetId::container("web")]
        );
    }

    #[test]
    fn service_list_keeps_service_units() {
        let output = r#"[
            {"unit":"sshd.service","load":"loaded","active":"active","sub":"running"},
            {"unit":"dbus.socket","load":"loaded","active":"active","sub":"running"},
            {"unit":"app.service","load":"loaded","active":"failed","sub":"failed"}
        ]"#;
        assert_eq!(
            parse_service_list(output),
            vec![TargetId::service("app.service"), TargetId::service("sshd.service")]
        );
        assert!(parse_service_list("oops").is_empty());
    }

    struct FakeRunner;

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, program: &str, _args: &[String]) -> Result<Vec<u8>, LogSourceError> {
            match program {
                DOCKER_BINARY => Err(LogSourceError::Unavailable {
                    message: "spawn docker: No such file or directory".to_owned(),
                }),
                _ => Ok(br#"[{"unit":"cron.service"}]"#.to_vec()),
            }
        }
    }

    #[tokio::test]
    async fn discovery_tolerates_missing_provider() {
        let targets = discover_targets(&FakeRunner).await;
        assert_eq!(targets, vec![TargetId::service("cron.service")]);
    }
}
