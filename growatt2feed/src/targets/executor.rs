use std::fmt;

use log::{info, warn};
use serde::Serialize;

use super::command::Command;
use crate::decision::Decision;
use crate::gateway_config::Credentials;
use crate::gateway_wrapper::GatewayWrapper;
use crate::sources::telemetry::REQUEST_FAILED;

const NO_ACTION: &str = "no action taken";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub command: Command,
    pub succeeded: bool,
    /// Gateway message, or the transport failure reason
    pub detail: String,
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded {
            write!(f, "{} succeeded", self.command)
        } else if self.detail.is_empty() {
            write!(f, "{} failed", self.command)
        } else {
            write!(f, "{} failed: {}", self.command, self.detail)
        }
    }
}

/// Per-command outcomes of one execution, in the order the commands were sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub outcomes: Vec<CommandOutcome>,
}

impl ActionReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.succeeded)
    }
}

impl fmt::Display for ActionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcomes.is_empty() {
            return f.write_str(NO_ACTION);
        }
        let lines: Vec<String> = self.outcomes.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

fn commands_for(decision: Decision) -> &'static [Command] {
    match decision {
        Decision::Enable => &[Command::EnableGridFeed, Command::EnablePeakShaving],
        Decision::Disable => &[Command::DisableGridFeed],
        Decision::NoOp => &[],
    }
}

async fn send(gateway: &dyn GatewayWrapper, credentials: &Credentials, command: Command) -> CommandOutcome {
    let params = command.params(credentials.serial_num());
    info!("sending {command}");

    match gateway.post(credentials, &params).await {
        Ok(envelope) => CommandOutcome {
            command,
            succeeded: envelope.success,
            detail: envelope.msg,
        },
        Err(e) => {
            warn!("{command} failed: {e:#}");
            CommandOutcome {
                command,
                succeeded: false,
                detail: REQUEST_FAILED.into(),
            }
        }
    }
}

/// Send the commands a decision calls for. Commands run one after another and
/// a failed command never stops the next one.
pub async fn execute_action(
    gateway: &dyn GatewayWrapper,
    credentials: &Credentials,
    decision: Decision,
) -> ActionReport {
    let mut report = ActionReport::default();
    for command in commands_for(decision) {
        report.outcomes.push(send(gateway, credentials, *command).await);
    }
    report
}
