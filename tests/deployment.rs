// Container recipe checks
// The Dockerfile and the shipped config.toml must agree on how the server is reached

use std::path::Path;

fn read(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

fn shipped_config() -> toml::Table {
    read("config.toml").parse().expect("config.toml is valid TOML")
}

fn server_value(key: &str) -> i64 {
    shipped_config()["server"][key]
        .as_integer()
        .unwrap_or_else(|| panic!("server.{key} is an integer"))
}

/// Instruction lines of the Dockerfile, with continuation lines joined
fn instructions(dockerfile: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();

    for line in dockerfile.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }
        pending.push_str(line);
        out.push(std::mem::take(&mut pending));
    }
    out
}

fn position(lines: &[String], pred: impl Fn(&str) -> bool, what: &str) -> usize {
    lines
        .iter()
        .position(|l| pred(l))
        .unwrap_or_else(|| panic!("Dockerfile has no {what}"))
}

fn exposed_ports(dockerfile: &str) -> Vec<i64> {
    instructions(dockerfile)
        .iter()
        .filter_map(|l| l.strip_prefix("EXPOSE "))
        .flat_map(str::split_whitespace)
        .map(|p| {
            p.split('/')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or_else(|| panic!("bad EXPOSE value {p}"))
        })
        .collect()
}

#[test]
fn test_exposed_port_matches_bind_port() {
    let ports = exposed_ports(&read("Dockerfile"));
    assert_eq!(ports, vec![server_value("port")]);
}

#[test]
fn test_binds_all_interfaces() {
    assert_eq!(shipped_config()["server"]["host"].as_str(), Some("0.0.0.0"));
}

#[test]
fn test_worker_count_is_fixed_at_four() {
    let workers = server_value("workers");
    assert!(workers > 0);
    assert_eq!(workers, 4);
}

#[test]
fn test_dependency_layer_precedes_sources_and_command() {
    let lines = instructions(&read("Dockerfile"));

    let manifest = position(&lines, |l| l.starts_with("COPY Cargo.toml"), "manifest copy");
    let deps = position(
        &lines,
        |l| l.starts_with("RUN") && l.contains("cargo build"),
        "dependency build",
    );
    let sources = position(&lines, |l| l.starts_with("COPY src"), "source copy");
    let cmd = position(&lines, |l| l.starts_with("CMD"), "start command");

    assert!(manifest < deps, "manifest must be copied before building deps");
    assert!(deps < sources, "dependencies must build before sources are copied");
    assert!(sources < cmd, "sources must be copied before the start command");
}

#[test]
fn test_start_command_uses_shipped_config() {
    let lines = instructions(&read("Dockerfile"));
    let cmd = &lines[position(&lines, |l| l.starts_with("CMD"), "start command")];
    assert!(cmd.contains("voting_server"));
    assert!(cmd.contains("/app/config"));
    assert!(lines.iter().any(|l| l.starts_with("COPY config.toml")));
}

#[test]
fn test_no_comment_names_another_port() {
    let dockerfile = read("Dockerfile");
    let port = server_value("port");

    for comment in dockerfile
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('#'))
        .filter(|l| l.to_ascii_lowercase().contains("port"))
    {
        for number in comment
            .split(|c: char| !c.is_ascii_digit())
            .filter_map(|n| n.parse::<i64>().ok())
        {
            assert_eq!(number, port, "comment names a different port: {comment}");
        }
    }
}
