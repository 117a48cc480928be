//! Service configuration tasks: cron, uwsgi, nginx, supervisor

use std::collections::HashMap;
use std::path::PathBuf;

use crate::context::{DeploymentContext, TemplateStore};
use crate::executor::{shell_quote, Executor};

use super::TaskResult;

/// Render and install the cron file, when the project ships a cron template
pub fn setup_cron(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    store: &TemplateStore,
) -> TaskResult {
    if !store.exists("cron.template") {
        return Ok(());
    }
    ctx.reporter().info("configuring cron");

    // cron skips config files whose names contain dots
    let filename = ctx.resolve_str("nginx.server_name")?.replace('.', "_");
    let dest = PathBuf::from(ctx.resolve_str("cron.config_path")?)
        .join(filename)
        .to_string_lossy()
        .into_owned();

    let mut rendered = ctx.render_template(&store.read_raw("cron.template")?, &HashMap::new())?;
    // cron also skips files without a trailing newline
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    exec.upload(&dest, &rendered)?;
    exec.sudo(&format!("chown root:root {}", shell_quote(&dest)))?;
    exec.sudo(&format!("chmod 644 {}", shell_quote(&dest)))?;
    Ok(())
}

/// Render uwsgi.ini into the project directory and prepare its log file
pub fn setup_uwsgi(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    store: &TemplateStore,
) -> TaskResult {
    ctx.reporter().info("configuring uwsgi");

    let project_dir = ctx.project_dir()?;
    let wsgi_file = PathBuf::from(&project_dir)
        .join(ctx.project_name())
        .join("wsgi.py")
        .to_string_lossy()
        .into_owned();
    let uwsgi_ini = format!("{}/uwsgi.ini", project_dir);
    let log_file = format!("{}/uwsgi.log", ctx.resolve_str("logs.path")?);

    exec.sudo(&format!("touch {}", shell_quote(&log_file)))?;
    exec.sudo(&format!(
        "chown {}:{} {}",
        ctx.resolve_str("system.user")?,
        ctx.resolve_str("system.group")?,
        shell_quote(&log_file)
    ))?;

    let mut vars = HashMap::new();
    vars.insert("project_dir".to_string(), project_dir);
    vars.insert("wsgi_file".to_string(), wsgi_file);

    let rendered = ctx.render_template(&store.read_raw("uwsgi.template")?, &vars)?;
    exec.upload(&uwsgi_ini, &rendered)?;
    Ok(())
}

/// Render and install the nginx site, choosing the SSL template when both
/// key and certificate are configured, then reload nginx.
pub fn setup_nginx(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    store: &TemplateStore,
) -> TaskResult {
    ctx.reporter().info("configuring nginx");

    let mut vars = HashMap::new();
    vars.insert("project_dir".to_string(), ctx.project_dir()?);

    let mut ssl = false;
    if let (Some(key), Some(cert)) = (
        ctx.resolve_opt_str("ssl.key")?,
        ctx.resolve_opt_str("ssl.cert")?,
    ) {
        ssl = true;
        if exec.exists(&key)? {
            vars.insert("ssl_key".to_string(), key);
        }
        if exec.exists(&cert)? {
            vars.insert("ssl_cert".to_string(), cert);
        }
        if let Some(dhparam) = ctx.resolve_opt_str("ssl.dhparam")? {
            if exec.exists(&dhparam)? {
                vars.insert("ssl_dhparam".to_string(), dhparam);
            }
        }
    }

    let template = if ssl { "nginx_ssl.template" } else { "nginx.template" };
    let rendered = ctx.render_template(&store.read_raw(template)?, &vars)?;
    exec.upload(&ctx.resolve_str("nginx.config_path")?, &rendered)?;

    let document_root = ctx.resolve_str("nginx.document_root")?;
    if exec.exists(&document_root)? {
        exec.sudo(&format!(
            "chown -R {}:{} {}",
            ctx.resolve_str("system.user")?,
            ctx.resolve_str("system.group")?,
            shell_quote(&document_root)
        ))?;
    }

    exec.sudo("service nginx reload")?;
    Ok(())
}

/// Render the supervisor program config and reload supervisor
pub fn setup_supervisor(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    store: &TemplateStore,
) -> TaskResult {
    ctx.reporter().info("configuring supervisor");

    let project_dir = ctx.project_dir()?;
    let uwsgi_ini = format!("{}/uwsgi.ini", project_dir);

    let mut vars = HashMap::new();
    vars.insert("project_dir".to_string(), project_dir);
    vars.insert("uwsgi_ini".to_string(), uwsgi_ini);

    let rendered = ctx.render_template(&store.read_raw("supervisor.template")?, &vars)?;
    exec.upload(&ctx.resolve_str("supervisor.config_path")?, &rendered)?;
    exec.sudo("supervisorctl reload")?;
    Ok(())
}

/// Probe the managed services and print an [OK]/[FAIL] line per service.
/// Failures are reported, not propagated.
pub fn check_services(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let reporter = ctx.reporter();
    reporter.info("checking services");

    let server_name = ctx.resolve_str("nginx.server_name")?;
    let checks = [
        (
            "uwsgi",
            format!(
                "ps aux | grep uwsgi | grep '{}' | grep -v grep",
                server_name
            ),
        ),
        (
            "nginx",
            "ps aux | grep 'nginx: master' | grep -v grep".to_string(),
        ),
        (
            "supervisor",
            "ps aux | grep supervisord | grep -v grep".to_string(),
        ),
    ];

    for (name, cmd) in checks {
        match exec.run(&cmd) {
            Ok(_) => reporter.info(&format!(" - {:<12} [OK]", name)),
            Err(_) => reporter.error(&format!(" - {:<12} [FAIL]", name)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::project::ProjectConfig;
    use std::fs;
    use tempfile::TempDir;

    fn acme(extra_global: &str) -> DeploymentContext {
        let config = ProjectConfig::parse(&format!(
            "global:\n  django:\n    project_name: acme\n{}stages:\n  prod: {{}}\n",
            extra_global
        ))
        .unwrap();
        DeploymentContext::select_stage(&config, "prod").unwrap()
    }

    fn store_with(files: &[(&str, &str)]) -> (TempDir, TemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = TemplateStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_setup_cron_skipped_without_template() {
        let ctx = acme("");
        let exec = MockExecutor::new("web1");
        let (_dir, store) = store_with(&[]);

        setup_cron(&ctx, &exec, &store).unwrap();
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn test_setup_cron_renames_and_appends_newline() {
        let ctx = acme("  nginx:\n    server_name: acme.example.com\n");
        let exec = MockExecutor::new("web1");
        let (_dir, store) = store_with(&[(
            "cron.template",
            "0 3 * * * www-data {{ project_dir }}/cron.sh",
        )]);

        // project_dir is not in vars here; it resolves through the context
        setup_cron(&ctx, &exec, &store).unwrap();

        let uploaded = exec.file("/etc/cron.d/acme_example_com").expect("cron file");
        assert!(uploaded.ends_with('\n'));
        assert_eq!(exec.count_matching("chmod 644"), 1);
    }

    #[test]
    fn test_setup_uwsgi_uploads_ini() {
        let ctx = acme("");
        let exec = MockExecutor::new("web1");
        let (_dir, store) = store_with(&[(
            "uwsgi.template",
            "[uwsgi]\nchdir = {{ project_dir }}\nwsgi-file = {{ wsgi_file }}\n",
        )]);

        setup_uwsgi(&ctx, &exec, &store).unwrap();

        let uploaded = exec.file("/var/www/acme/acme/uwsgi.ini").expect("uwsgi.ini");
        assert!(uploaded.contains("chdir = /var/www/acme/acme"));
        assert!(uploaded.contains("wsgi-file = /var/www/acme/acme/acme/wsgi.py"));
        assert_eq!(exec.count_matching("touch '/var/log/acme/uwsgi.log'"), 1);
    }

    #[test]
    fn test_setup_nginx_plain_template() {
        let ctx = acme("");
        let exec = MockExecutor::new("web1");
        let (_dir, store) = store_with(&[
            ("nginx.template", "server_name {{ ctx('nginx.server_name') }};"),
            ("nginx_ssl.template", "ssl"),
        ]);

        setup_nginx(&ctx, &exec, &store).unwrap();

        let uploaded = exec
            .file("/etc/nginx/sites-enabled/example.com")
            .expect("site config");
        assert_eq!(uploaded, "server_name example.com;");
        assert_eq!(exec.count_matching("service nginx reload"), 1);
    }

    #[test]
    fn test_setup_nginx_prefers_ssl_template() {
        let ctx = acme(
            "  ssl:\n    key: /etc/ssl/acme.key\n    cert: /etc/ssl/acme.crt\n",
        );
        let exec = MockExecutor::new("web1");
        exec.put_file("/etc/ssl/acme.key", "");
        exec.put_file("/etc/ssl/acme.crt", "");
        let (_dir, store) = store_with(&[
            ("nginx.template", "plain"),
            ("nginx_ssl.template", "ssl_certificate {{ ssl_cert }};"),
        ]);

        setup_nginx(&ctx, &exec, &store).unwrap();

        let uploaded = exec
            .file("/etc/nginx/sites-enabled/example.com")
            .expect("site config");
        assert_eq!(uploaded, "ssl_certificate /etc/ssl/acme.crt;");
    }

    #[test]
    fn test_check_services_does_not_abort_on_failure() {
        let ctx = acme("");
        let exec = MockExecutor::new("web1");
        exec.fail_on("supervisord", 1);

        check_services(&ctx, &exec).unwrap();
        assert_eq!(exec.count_matching("ps aux"), 3);
    }
}
