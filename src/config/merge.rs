//! Merge of user container configuration with inherited image configuration
//!
//! Every field follows a fixed precedence rule: the user value wins when set,
//! otherwise the value carried by the base image is inherited. The merge is
//! deterministic and side-effect free.

use super::ContainerConfig;

/// Case policy used when comparing environment variable names during merge.
///
/// Environment variables are case-insensitive on Windows and case-sensitive
/// everywhere else. The asymmetry is surfaced as an explicit policy rather
/// than probed from the build target, so callers decide which platform's
/// semantics apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKeyCase {
    Sensitive,
    Insensitive,
}

impl EnvKeyCase {
    /// Policy for a platform string as found in image configurations
    pub fn for_platform(os: &str) -> Self {
        if os.eq_ignore_ascii_case("windows") {
            EnvKeyCase::Insensitive
        } else {
            EnvKeyCase::Sensitive
        }
    }

    fn keys_equal(self, a: &str, b: &str) -> bool {
        match self {
            EnvKeyCase::Sensitive => a == b,
            EnvKeyCase::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

fn env_key(entry: &str) -> &str {
    entry.split('=').next().unwrap_or(entry)
}

/// Merge two configurations: the image configuration provides defaults, the
/// user configuration overrides them. Returns the merged result; neither
/// input is modified.
pub fn merge(
    user_conf: &ContainerConfig,
    image_conf: &ContainerConfig,
    env_case: EnvKeyCase,
) -> ContainerConfig {
    let mut merged = user_conf.clone();

    if merged.user.is_empty() {
        merged.user = image_conf.user.clone();
    }

    if merged.exposed_ports.is_empty() {
        merged.exposed_ports = image_conf.exposed_ports.clone();
    } else {
        for (port, v) in &image_conf.exposed_ports {
            merged.exposed_ports.entry(port.clone()).or_insert(*v);
        }
    }

    if merged.env.is_empty() {
        merged.env = image_conf.env.clone();
    } else {
        for image_env in &image_conf.env {
            let image_key = env_key(image_env);
            let found = merged
                .env
                .iter()
                .any(|user_env| env_case.keys_equal(env_key(user_env), image_key));
            if !found {
                merged.env.push(image_env.clone());
            }
        }
    }

    for (label, value) in &image_conf.labels {
        merged
            .labels
            .entry(label.clone())
            .or_insert_with(|| value.clone());
    }

    // Entrypoint and command are inherited atomically: only when the user
    // specified neither do both come from the image, along with the
    // args-escaped flag.
    if merged.entrypoint.is_empty() {
        if merged.cmd.is_empty() {
            merged.cmd = image_conf.cmd.clone();
            merged.args_escaped = image_conf.args_escaped;
        }
        merged.entrypoint = image_conf.entrypoint.clone();
    }

    if let Some(image_health) = &image_conf.healthcheck {
        match &mut merged.healthcheck {
            None => merged.healthcheck = Some(image_health.clone()),
            Some(user_health) => {
                if user_health.test.is_empty() {
                    user_health.test = image_health.test.clone();
                }
                if user_health.interval == 0 {
                    user_health.interval = image_health.interval;
                }
                if user_health.timeout == 0 {
                    user_health.timeout = image_health.timeout;
                }
                if user_health.retries == 0 {
                    user_health.retries = image_health.retries;
                }
            }
        }
    }

    if merged.working_dir.is_empty() {
        merged.working_dir = image_conf.working_dir.clone();
    }

    if merged.volumes.is_empty() {
        merged.volumes = image_conf.volumes.clone();
    } else {
        for (k, v) in &image_conf.volumes {
            merged.volumes.insert(k.clone(), *v);
        }
    }

    if merged.stop_signal.is_empty() {
        merged.stop_signal = image_conf.stop_signal.clone();
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Empty, HealthConfig};

    fn conf_with_env(env: &[&str]) -> ContainerConfig {
        ContainerConfig {
            env: env.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn user_env_wins_on_key_collision() {
        let user = conf_with_env(&["A=1"]);
        let image = conf_with_env(&["A=2", "B=3"]);

        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        assert_eq!(merged.env, vec!["A=1", "B=3"]);
    }

    #[test]
    fn env_inherited_wholesale_when_user_empty() {
        let user = conf_with_env(&[]);
        let image = conf_with_env(&["A=2", "B=3"]);

        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        assert_eq!(merged.env, vec!["A=2", "B=3"]);
    }

    #[test]
    fn env_key_case_policy_is_preserved() {
        let user = conf_with_env(&["PATH=/custom"]);
        let image = conf_with_env(&["Path=/default"]);

        let sensitive = merge(&user, &image, EnvKeyCase::Sensitive);
        assert_eq!(sensitive.env, vec!["PATH=/custom", "Path=/default"]);

        let insensitive = merge(&user, &image, EnvKeyCase::Insensitive);
        assert_eq!(insensitive.env, vec!["PATH=/custom"]);
    }

    #[test]
    fn for_platform_selects_windows_asymmetry() {
        assert_eq!(EnvKeyCase::for_platform("windows"), EnvKeyCase::Insensitive);
        assert_eq!(EnvKeyCase::for_platform("linux"), EnvKeyCase::Sensitive);
    }

    #[test]
    fn entrypoint_and_cmd_inherited_atomically() {
        let user = ContainerConfig::default();
        let image = ContainerConfig {
            entrypoint: vec!["sh".into()],
            cmd: vec!["-c".into(), "echo hi".into()],
            args_escaped: true,
            ..Default::default()
        };

        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        assert_eq!(merged.entrypoint, vec!["sh"]);
        assert_eq!(merged.cmd, vec!["-c", "echo hi"]);
        assert!(merged.args_escaped);
    }

    #[test]
    fn user_cmd_blocks_cmd_inheritance() {
        let user = ContainerConfig {
            cmd: vec!["echo".into(), "user".into()],
            ..Default::default()
        };
        let image = ContainerConfig {
            entrypoint: vec!["sh".into()],
            cmd: vec!["-c".into(), "echo image".into()],
            args_escaped: true,
            ..Default::default()
        };

        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        // entrypoint is still inherited, cmd and the escape flag are not
        assert_eq!(merged.entrypoint, vec!["sh"]);
        assert_eq!(merged.cmd, vec!["echo", "user"]);
        assert!(!merged.args_escaped);
    }

    #[test]
    fn scalars_inherit_only_when_empty() {
        let user = ContainerConfig {
            user: "app".into(),
            ..Default::default()
        };
        let image = ContainerConfig {
            user: "root".into(),
            working_dir: "/srv".into(),
            stop_signal: "SIGTERM".into(),
            ..Default::default()
        };

        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        assert_eq!(merged.user, "app");
        assert_eq!(merged.working_dir, "/srv");
        assert_eq!(merged.stop_signal, "SIGTERM");
    }

    #[test]
    fn set_fields_union_with_user_precedence() {
        let mut user = ContainerConfig::default();
        user.exposed_ports.insert("8080/tcp".into(), Empty {});
        user.labels.insert("team".into(), "storage".into());

        let mut image = ContainerConfig::default();
        image.exposed_ports.insert("80/tcp".into(), Empty {});
        image.labels.insert("team".into(), "base".into());
        image.labels.insert("os".into(), "linux".into());
        image.volumes.insert("/data".into(), Empty {});

        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        assert!(merged.exposed_ports.contains_key("80/tcp"));
        assert!(merged.exposed_ports.contains_key("8080/tcp"));
        assert_eq!(merged.labels["team"], "storage");
        assert_eq!(merged.labels["os"], "linux");
        assert!(merged.volumes.contains_key("/data"));
    }

    #[test]
    fn healthcheck_inherited_whole_or_per_field() {
        let image = ContainerConfig {
            healthcheck: Some(HealthConfig {
                test: vec!["CMD".into(), "curl".into()],
                interval: 30,
                timeout: 5,
                retries: 3,
            }),
            ..Default::default()
        };

        // no user healthcheck: whole structure inherited
        let merged = merge(&ContainerConfig::default(), &image, EnvKeyCase::Sensitive);
        assert_eq!(merged.healthcheck, image.healthcheck);

        // partial user healthcheck: only unset sub-fields filled
        let user = ContainerConfig {
            healthcheck: Some(HealthConfig {
                test: vec![],
                interval: 60,
                timeout: 0,
                retries: 0,
            }),
            ..Default::default()
        };
        let merged = merge(&user, &image, EnvKeyCase::Sensitive);
        let health = merged.healthcheck.unwrap();
        assert_eq!(health.test, vec!["CMD", "curl"]);
        assert_eq!(health.interval, 60);
        assert_eq!(health.timeout, 5);
        assert_eq!(health.retries, 3);
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let user = conf_with_env(&["A=1"]);
        let image = conf_with_env(&["B=2"]);
        let user_before = user.clone();
        let image_before = image.clone();

        let _ = merge(&user, &image, EnvKeyCase::Sensitive);
        assert_eq!(user, user_before);
        assert_eq!(image, image_before);
    }
}
