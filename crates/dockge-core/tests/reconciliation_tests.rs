//! # Stack Reconciliation Tests
//!
//! Drift detection, image update detection and status aggregation against
//! an in-memory runtime.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use common::{Fixture, ps_line};
use dockge_core::{Stack, StackRegistry, StackStatus};

const WEB_DB: &str = "services:\n  web:\n    image: nginx:1.25\n  db:\n    image: postgres:16\n";

// =============================================================================
// DRIFT AND STATUS
// =============================================================================

mod drift {
    use super::*;

    #[tokio::test]
    async fn changed_image_flags_recreate_and_mixed_status() {
        let fx = Fixture::new();
        fx.write_stack("app", WEB_DB, None);
        fx.runtime.set_status_lines(&[
            ps_line("web", "nginx:1.25", "running", "", "sha256:w"),
            ps_line("db", "postgres:15", "exited", "", "sha256:d"),
        ]);

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;

        assert_eq!(stack.status(), StackStatus::RunningAndExited);
        assert!(stack.recreate_necessary());
        assert!(stack.services()["db"].recreate_necessary);
        assert!(!stack.services()["web"].recreate_necessary);
        assert!(!stack.services()["db"].image_update_available);
    }

    #[tokio::test]
    async fn substituted_image_is_compared() {
        let fx = Fixture::new();
        fx.write_stack(
            "app",
            "services:\n  web:\n    image: nginx:${TAG}\n",
            Some("TAG=1.25\n"),
        );
        fx.runtime
            .set_status_lines(&[ps_line("web", "nginx:1.25", "running", "", "sha256:w")]);

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert!(!stack.recreate_necessary());
        assert_eq!(stack.status(), StackStatus::Running);
    }

    #[tokio::test]
    async fn undeclared_service_is_not_drift() {
        let fx = Fixture::new();
        fx.write_stack("app", "services:\n  web:\n    build: .\n", None);
        fx.runtime
            .set_status_lines(&[ps_line("web", "app-web", "running", "", "sha256:w")]);

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert!(!stack.recreate_necessary());
    }

    #[tokio::test]
    async fn unhealthy_overrides_and_ignore_label_excludes() {
        let fx = Fixture::new();
        fx.write_stack("app", WEB_DB, None);
        fx.runtime.set_status_lines(&[
            ps_line("web", "nginx:1.25", "running", "unhealthy", "sha256:w"),
            ps_line("db", "postgres:16", "running", "healthy", "sha256:d"),
        ]);
        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert_eq!(stack.status(), StackStatus::Unhealthy);
        assert!(stack.is_unhealthy());

        let fx = Fixture::new();
        fx.write_stack(
            "app",
            "services:\n  web:\n    image: nginx:1.25\n    labels:\n      dockge.status.ignore: \"true\"\n  db:\n    image: postgres:16\n",
            None,
        );
        fx.runtime.set_status_lines(&[
            ps_line("web", "nginx:1.25", "exited", "unhealthy", "sha256:w"),
            ps_line("db", "postgres:16", "running", "", "sha256:d"),
        ]);
        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert_eq!(stack.status(), StackStatus::Running);
    }

    #[tokio::test]
    async fn created_services_are_not_counted() {
        let fx = Fixture::new();
        fx.write_stack("app", WEB_DB, None);
        fx.runtime.set_status_lines(&[
            ps_line("web", "nginx:1.25", "created", "", "sha256:w"),
            ps_line("db", "postgres:16", "created", "", "sha256:d"),
        ]);
        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert_eq!(stack.status(), StackStatus::Unknown);
        assert_eq!(stack.services().len(), 2);
    }

    #[tokio::test]
    async fn no_live_services_means_draft() {
        let fx = Fixture::new();
        fx.write_stack("app", WEB_DB, None);
        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert_eq!(stack.status(), StackStatus::CreatedFile);
        assert!(stack.services().is_empty());
    }

    #[tokio::test]
    async fn failed_pass_keeps_previous_state() {
        let fx = Fixture::new();
        fx.write_stack("app", WEB_DB, None);
        fx.runtime
            .set_status_lines(&[ps_line("web", "nginx:1.25", "running", "", "sha256:w")]);
        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert_eq!(stack.status(), StackStatus::Running);

        fx.runtime
            .fail_queries
            .store(true, std::sync::atomic::Ordering::SeqCst);
        stack.update_data(false).await;
        assert_eq!(stack.status(), StackStatus::Running);
        assert_eq!(stack.services().len(), 1);
    }

    #[tokio::test]
    async fn stats_attach_by_container_name() {
        let fx = Fixture::new();
        fx.write_stack("app", WEB_DB, None);
        fx.runtime
            .set_status_lines(&[ps_line("web", "nginx:1.25", "running", "", "sha256:w")]);
        *fx.runtime.stats.lock().unwrap() =
            "{\"Name\":\"app-web-1\",\"CPUPerc\":\"1.5%\",\"MemUsage\":\"20MiB / 2GiB\"}".into();

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(true).await;
        let stats = stack.services()["web"].stats.clone().unwrap();
        assert_eq!(stats.cpu_perc, "1.5%");
    }
}

// =============================================================================
// IMAGE UPDATES
// =============================================================================

mod image_updates {
    use super::*;

    fn seed(fx: &Fixture) {
        fx.runtime
            .set_local_image("nginx:1.25", "sha256:id1", "sha256:aaa");
        fx.runtime.set_remote_digest("nginx:1.25", "sha256:bbb");
        fx.runtime
            .set_status_lines(&[ps_line("web", "nginx:1.25", "running", "", "sha256:id1")]);
    }

    #[tokio::test]
    async fn newer_remote_digest_is_reported() {
        let fx = Fixture::new();
        fx.write_stack("app", "services:\n  web:\n    image: nginx:1.25\n", None);
        seed(&fx);
        fx.ctx
            .images()
            .update("app", "web", "nginx:1.25")
            .await
            .unwrap();

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        let web = &stack.services()["web"];
        assert!(web.image_update_available);
        assert_eq!(web.remote_image_digest, "sha256:bbb");
        assert!(stack.image_updates_available());
    }

    #[tokio::test]
    async fn check_disabled_by_list_style_label() {
        let fx = Fixture::new();
        fx.write_stack(
            "app",
            "services:\n  web:\n    image: nginx:1.25\n    labels:\n      - dockge.imageupdates.check=false\n",
            None,
        );
        seed(&fx);
        fx.ctx
            .images()
            .update("app", "web", "nginx:1.25")
            .await
            .unwrap();

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert!(!stack.services()["web"].image_update_available);
    }

    #[tokio::test]
    async fn acknowledged_digest_is_silenced_until_a_newer_one() {
        let fx = Fixture::new();
        fx.write_stack(
            "app",
            "services:\n  web:\n    image: nginx:1.25\n    labels:\n      dockge.imageupdates.ignore: sha256:bbb\n",
            None,
        );
        seed(&fx);
        fx.ctx
            .images()
            .update("app", "web", "nginx:1.25")
            .await
            .unwrap();

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert!(!stack.services()["web"].image_update_available);

        fx.runtime.set_remote_digest("nginx:1.25", "sha256:ccc");
        fx.ctx
            .images()
            .update("app", "web", "nginx:1.25")
            .await
            .unwrap();
        stack.update_data(false).await;
        assert!(stack.services()["web"].image_update_available);
    }

    #[tokio::test]
    async fn new_live_image_id_refreshes_local_digest() {
        let fx = Fixture::new();
        fx.write_stack("app", "services:\n  web:\n    image: nginx:1.25\n", None);
        seed(&fx);
        fx.ctx
            .images()
            .update("app", "web", "nginx:1.25")
            .await
            .unwrap();

        // the container was recreated from the pulled image
        fx.runtime
            .set_local_image("nginx:1.25", "sha256:id2", "sha256:bbb");
        fx.runtime
            .set_status_lines(&[ps_line("web", "nginx:1.25", "running", "", "sha256:id2")]);

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert!(!stack.services()["web"].image_update_available);
        let info = fx.ctx.images().get_image_info("app", "web", "nginx:1.25");
        assert_eq!(info.local_id(), "sha256:id2");
        assert_eq!(info.remote_digest(), "sha256:bbb");
    }

    #[tokio::test]
    async fn image_infos_are_reset_before_refresh() {
        let fx = Fixture::new();
        fx.write_stack("app", "services:\n  web:\n    image: nginx:1.25\n", None);
        seed(&fx);
        fx.runtime
            .set_local_image("stale:image", "sha256:old", "sha256:old");
        fx.ctx
            .images()
            .update("app", "web", "stale:image")
            .await
            .unwrap();
        assert_eq!(
            fx.ctx
                .images()
                .get_image_info("app", "web", "stale:image")
                .local_id(),
            "sha256:old"
        );

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        stack.update_image_infos().await;

        let info = fx.ctx.images().get_image_info("app", "web", "nginx:1.25");
        assert_eq!(info.remote_digest(), "sha256:bbb");
        assert_eq!(
            fx.ctx
                .images()
                .get_image_info("app", "web", "stale:image")
                .local_id(),
            ""
        );
    }

    #[tokio::test]
    async fn ignore_update_writes_label_and_keeps_comments() {
        let fx = Fixture::new();
        fx.write_stack(
            "app",
            "# production web\nservices:\n  web:\n    image: nginx:1.25 # pinned minor\n",
            None,
        );
        seed(&fx);
        fx.ctx
            .images()
            .update("app", "web", "nginx:1.25")
            .await
            .unwrap();

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        assert!(stack.services()["web"].image_update_available);

        stack.ignore_update("web").await.unwrap();
        assert!(!stack.services()["web"].image_update_available);

        let written = std::fs::read_to_string(fx.dir.path().join("app/compose.yaml")).unwrap();
        assert!(written.starts_with("# production web\n"));
        assert!(written.contains("# pinned minor"));
        assert!(written.contains("dockge.imageupdates.ignore: sha256:bbb"));
    }

    #[tokio::test]
    async fn ignore_update_from_a_fresh_context_looks_the_digest_up() {
        let fx = Fixture::new();
        fx.write_stack("app", "services:\n  web:\n    image: nginx:1.25\n", None);
        seed(&fx);

        let registry = StackRegistry::new(fx.ctx.clone());
        let mut stack = registry.get_stack("app", false).await.unwrap();
        assert_eq!(stack.services()["web"].remote_image_digest, "");

        stack.ignore_update("web").await.unwrap();

        let written = std::fs::read_to_string(fx.dir.path().join("app/compose.yaml")).unwrap();
        assert!(written.contains("dockge.imageupdates.ignore: sha256:bbb"));
        assert!(!stack.services()["web"].image_update_available);
    }

    #[tokio::test]
    async fn ignore_update_without_remote_digest_fails() {
        let fx = Fixture::new();
        fx.write_stack("app", "services:\n  web:\n    image: nginx:1.25\n", None);
        fx.runtime
            .set_status_lines(&[ps_line("web", "nginx:1.25", "running", "", "sha256:id1")]);

        let mut stack = Stack::new(fx.ctx.clone(), "app");
        stack.update_data(false).await;
        let err = stack.ignore_update("web").await.unwrap_err();
        assert_eq!(err.to_string(), "No known image update for service 'web'");
    }
}
