//! End-to-end context resolution tests
//!
//! Exercises the full layer stack through the public API: built-in defaults,
//! project file, stage overrides, and the per-host remote context fetched
//! over a mock executor.

use dploy::context::{DeploymentContext, LayerOrigin};
use dploy::executor::MockExecutor;
use dploy::project::ProjectConfig;

const PROJECT: &str = r#"
global:
  django:
    project_name: acme
  git:
    repository: git@git.example.com:acme/acme.git
  system:
    packages: [git]
stages:
  prod:
    hosts: [deploy@web1.example.com]
    nginx:
      server_name: acme.example.com
    system:
      packages: [nginx]
  beta:
    hosts: [web2]
"#;

fn prod() -> DeploymentContext {
    let config = ProjectConfig::parse(PROJECT).unwrap();
    DeploymentContext::select_stage(&config, "prod").unwrap()
}

#[test]
fn test_stage_layer_wins_over_global_and_default() {
    let ctx = prod();
    assert_eq!(ctx.resolve_str("nginx.server_name").unwrap(), "acme.example.com");
    assert_eq!(
        ctx.resolve_str("nginx.config_path").unwrap(),
        "/etc/nginx/sites-enabled/acme.example.com"
    );
}

#[test]
fn test_defaults_interpolate_project_name() {
    let ctx = prod();
    assert_eq!(ctx.project_name(), "acme");
    assert_eq!(ctx.resolve_str("nginx.document_root").unwrap(), "/var/www/acme");
    assert_eq!(ctx.project_dir().unwrap(), "/var/www/acme/acme");
    assert_eq!(
        ctx.resolve_str("django.static_root").unwrap(),
        "/var/www/acme/acme/static"
    );
}

#[test]
fn test_sequences_concatenate_across_layers() {
    let ctx = prod();
    assert_eq!(
        ctx.resolve_str_seq("system.packages").unwrap(),
        vec!["git", "nginx"]
    );
}

#[test]
fn test_remote_layer_merges_on_bind() {
    let config = ProjectConfig::parse(PROJECT).unwrap();
    let mut ctx = DeploymentContext::select_stage(&config, "prod").unwrap();
    let exec = MockExecutor::new("web1.example.com");
    exec.put_file(
        "/root/.context/acme/prod.yml",
        "django:\n  secret_key: s3cret\nsystem:\n  packages: [redis-server]\n",
    );

    ctx.bind_host("web1.example.com", &exec).unwrap();

    assert_eq!(ctx.resolve_str("django.secret_key").unwrap(), "s3cret");
    assert_eq!(
        ctx.resolve_str_seq("system.packages").unwrap(),
        vec!["git", "nginx", "redis-server"]
    );
    let last = ctx.sources().last().unwrap();
    assert_eq!(last.origin, LayerOrigin::RemoteHost);
    assert!(last.digest.is_some());
}

#[test]
fn test_absent_remote_file_merges_as_empty() {
    let config = ProjectConfig::parse(PROJECT).unwrap();
    let mut ctx = DeploymentContext::select_stage(&config, "prod").unwrap();
    let exec = MockExecutor::new("web1.example.com");

    ctx.bind_host("web1.example.com", &exec).unwrap();

    // Nothing changed, and the absent layer is still recorded.
    assert_eq!(ctx.resolve_str("system.user").unwrap(), "www-data");
    let last = ctx.sources().last().unwrap();
    assert_eq!(last.origin, LayerOrigin::RemoteHost);
    assert!(last.digest.is_none());
}

#[test]
fn test_remote_file_fetched_at_most_once() {
    let config = ProjectConfig::parse(PROJECT).unwrap();
    let mut ctx = DeploymentContext::select_stage(&config, "prod").unwrap();
    let exec = MockExecutor::new("web1.example.com");
    exec.put_file("/root/.context/acme/prod.yml", "logs:\n  path: /srv/logs\n");

    ctx.bind_host("web1.example.com", &exec).unwrap();
    ctx.bind_host("web1.example.com", &exec).unwrap();

    assert_eq!(exec.count_matching("cat "), 1);
    // Repeated binds never re-concatenate sequences.
    assert_eq!(
        ctx.resolve_str_seq("system.packages").unwrap(),
        vec!["git", "nginx"]
    );
}

#[test]
fn test_invalid_remote_yaml_is_an_error() {
    let config = ProjectConfig::parse(PROJECT).unwrap();
    let mut ctx = DeploymentContext::select_stage(&config, "prod").unwrap();
    let exec = MockExecutor::new("web1.example.com");
    exec.put_file("/root/.context/acme/prod.yml", "not: [valid");

    assert!(ctx.bind_host("web1.example.com", &exec).is_err());
}

#[test]
fn test_stages_resolve_independent_hosts() {
    let config = ProjectConfig::parse(PROJECT).unwrap();

    let prod = DeploymentContext::select_stage(&config, "prod").unwrap();
    assert_eq!(prod.hosts().unwrap(), vec!["deploy@web1.example.com"]);

    let beta = DeploymentContext::select_stage(&config, "beta").unwrap();
    assert_eq!(beta.hosts().unwrap(), vec!["web2"]);
    // beta never declared a server_name, so the default applies
    assert_eq!(beta.resolve_str("nginx.server_name").unwrap(), "example.com");
}

#[test]
fn test_source_provenance_ordering() {
    let ctx = prod();
    let origins: Vec<LayerOrigin> = ctx.sources().iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![
            LayerOrigin::Builtin,
            LayerOrigin::ProjectGlobal,
            LayerOrigin::Stage,
        ]
    );
}
