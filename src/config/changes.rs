//! Dockerfile-style change instructions applied at commit time
//!
//! A commit request may carry `--change` lines such as `CMD ["sh"]` or
//! `ENV DEBUG=1`. Each line is a single instruction applied on top of the
//! user-supplied configuration before it is merged with the container's
//! current configuration.

use super::{ContainerConfig, Empty};

/// Errors raised while parsing change instructions
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChangeError {
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("{instruction} requires an argument")]
    MissingArgument { instruction: String },

    #[error("malformed {instruction} argument: {detail}")]
    Malformed { instruction: String, detail: String },
}

type Result<T> = std::result::Result<T, ChangeError>;

/// Apply a list of change instructions to `config`, returning the updated
/// configuration. Later instructions override earlier ones.
pub fn apply_changes(config: &ContainerConfig, changes: &[String]) -> Result<ContainerConfig> {
    let mut out = config.clone();
    for line in changes {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        apply_one(&mut out, line)?;
    }
    Ok(out)
}

fn apply_one(config: &mut ContainerConfig, line: &str) -> Result<()> {
    let (instruction, rest) = match line.split_once(char::is_whitespace) {
        Some((i, r)) => (i, r.trim()),
        None => (line, ""),
    };
    let upper = instruction.to_ascii_uppercase();

    if rest.is_empty() {
        return Err(ChangeError::MissingArgument { instruction: upper });
    }

    match upper.as_str() {
        "USER" => config.user = rest.to_string(),
        "WORKDIR" => config.working_dir = rest.to_string(),
        "STOPSIGNAL" => config.stop_signal = rest.to_string(),
        "EXPOSE" => {
            for port in rest.split_whitespace() {
                let port = if port.contains('/') {
                    port.to_string()
                } else {
                    format!("{}/tcp", port)
                };
                config.exposed_ports.insert(port, Empty {});
            }
        }
        "VOLUME" => {
            for path in parse_string_or_list(&upper, rest)? {
                config.volumes.insert(path, Empty {});
            }
        }
        "ENV" => {
            let (key, value) = parse_key_value(&upper, rest)?;
            let entry = format!("{}={}", key, value);
            match config.env.iter_mut().find(|e| env_key(e.as_str()) == key) {
                Some(existing) => *existing = entry,
                None => config.env.push(entry),
            }
        }
        "LABEL" => {
            let (key, value) = parse_key_value(&upper, rest)?;
            config.labels.insert(key, value);
        }
        "CMD" => config.cmd = parse_string_or_list(&upper, rest)?,
        "ENTRYPOINT" => config.entrypoint = parse_string_or_list(&upper, rest)?,
        "HEALTHCHECK" => {
            if rest.eq_ignore_ascii_case("NONE") {
                config.healthcheck = None;
            } else {
                return Err(ChangeError::Malformed {
                    instruction: upper,
                    detail: "only HEALTHCHECK NONE is supported as a change".into(),
                });
            }
        }
        _ => return Err(ChangeError::UnknownInstruction(instruction.to_string())),
    }
    Ok(())
}

fn env_key(entry: &str) -> &str {
    entry.split('=').next().unwrap_or(entry)
}

/// `KEY=value` or `KEY value` forms
fn parse_key_value(instruction: &str, rest: &str) -> Result<(String, String)> {
    if let Some((key, value)) = rest.split_once('=') {
        if key.is_empty() {
            return Err(ChangeError::Malformed {
                instruction: instruction.to_string(),
                detail: "empty key".into(),
            });
        }
        return Ok((key.trim().to_string(), trim_quotes(value.trim()).to_string()));
    }
    match rest.split_once(char::is_whitespace) {
        Some((key, value)) => Ok((key.to_string(), trim_quotes(value.trim()).to_string())),
        None => Err(ChangeError::Malformed {
            instruction: instruction.to_string(),
            detail: format!("expected key=value, got '{}'", rest),
        }),
    }
}

/// JSON array (exec form) or plain string (shell form, split on whitespace)
fn parse_string_or_list(instruction: &str, rest: &str) -> Result<Vec<String>> {
    if rest.starts_with('[') {
        serde_json::from_str::<Vec<String>>(rest).map_err(|e| ChangeError::Malformed {
            instruction: instruction.to_string(),
            detail: e.to_string(),
        })
    } else {
        Ok(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            rest.to_string(),
        ])
    }
}

fn trim_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_and_label_changes() {
        let base = ContainerConfig {
            env: vec!["DEBUG=0".into()],
            ..Default::default()
        };
        let changes = vec![
            "ENV DEBUG=1".to_string(),
            "ENV MODE production".to_string(),
            "LABEL maintainer=\"ops\"".to_string(),
        ];

        let out = apply_changes(&base, &changes).unwrap();
        assert_eq!(out.env, vec!["DEBUG=1", "MODE=production"]);
        assert_eq!(out.labels["maintainer"], "ops");
    }

    #[test]
    fn cmd_exec_and_shell_forms() {
        let exec = apply_changes(
            &ContainerConfig::default(),
            &["CMD [\"nginx\", \"-g\", \"daemon off;\"]".to_string()],
        )
        .unwrap();
        assert_eq!(exec.cmd, vec!["nginx", "-g", "daemon off;"]);

        let shell = apply_changes(
            &ContainerConfig::default(),
            &["ENTRYPOINT echo hi".to_string()],
        )
        .unwrap();
        assert_eq!(shell.entrypoint, vec!["/bin/sh", "-c", "echo hi"]);
    }

    #[test]
    fn expose_defaults_to_tcp() {
        let out = apply_changes(&ContainerConfig::default(), &["EXPOSE 80 53/udp".to_string()])
            .unwrap();
        assert!(out.exposed_ports.contains_key("80/tcp"));
        assert!(out.exposed_ports.contains_key("53/udp"));
    }

    #[test]
    fn healthcheck_none_clears() {
        let base = ContainerConfig {
            healthcheck: Some(Default::default()),
            ..Default::default()
        };
        let out = apply_changes(&base, &["HEALTHCHECK NONE".to_string()]).unwrap();
        assert!(out.healthcheck.is_none());
    }

    #[test]
    fn unknown_and_malformed_instructions_rejected() {
        let err = apply_changes(&ContainerConfig::default(), &["RUN make".to_string()])
            .unwrap_err();
        assert!(matches!(err, ChangeError::UnknownInstruction(_)));

        let err =
            apply_changes(&ContainerConfig::default(), &["ENV".to_string()]).unwrap_err();
        assert!(matches!(err, ChangeError::MissingArgument { .. }));

        let err = apply_changes(&ContainerConfig::default(), &["CMD [broken".to_string()])
            .unwrap_err();
        assert!(matches!(err, ChangeError::Malformed { .. }));
    }
}
