use crate::checks::issue::{IssueReport, IssueType};
use crate::console::Console;
use bollard::Docker;

/// Verifies the Docker daemon is reachable with the current permissions.
pub(crate) async fn check_docker_installed(issues: &IssueReport) {
    let docker = match Docker::connect_with_unix_defaults() {
        Ok(docker) => docker,
        Err(e) => {
            issues.add_issue(
                IssueType::DockerNotInstalled,
                format!("Failed to connect to Docker API: {e}. You may need to add your user to the docker group."),
            );
            return;
        }
    };

    match docker.ping().await {
        Ok(_) => Console::success("Docker API accessible"),
        Err(e) => issues.add_issue(
            IssueType::DockerNotInstalled,
            format!("Docker daemon is not responding: {e}"),
        ),
    }
}
