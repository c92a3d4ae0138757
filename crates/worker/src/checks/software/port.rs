use crate::checks::issue::{IssueReport, IssueType};
use crate::console::Console;
use std::net::TcpListener;

pub(crate) fn check_port_available(issues: &IssueReport, host: &str, port: u16) {
    match TcpListener::bind((host, port)) {
        Ok(_) => Console::success(&format!("Port {port} available")),
        Err(e) => issues.add_issue(
            IssueType::PortUnavailable,
            format!("Cannot bind {host}:{port}: {e}"),
        ),
    }
}
