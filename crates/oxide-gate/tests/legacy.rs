//! Integration tests for the legacy `next()`/`redirect()` matcher.

use oxide_gate::{
    legacy_rule, GateError, LegacyContext, LegacyControl, LegacyMatcher, RedirectOptions,
    Request, Response, Result, SharedLegacyRule, User,
};

fn nobody(_req: Request) -> futures::future::Ready<Result<Option<User>>> {
    futures::future::ready(Ok(None))
}

fn editor(_req: Request) -> futures::future::Ready<Result<Option<User>>> {
    futures::future::ready(Ok(Some(User::new("e").with_role("editor"))))
}

fn send_to(target: &'static str) -> SharedLegacyRule<User> {
    legacy_rule(move |_ctx: &LegacyContext<User>, control: &mut LegacyControl| {
        control.redirect(target, None);
        Ok(())
    })
}

#[tokio::test]
async fn test_wildcard_sorts_after_literal_regardless_of_order() {
    for wildcard_first in [true, false] {
        let matcher = LegacyMatcher::new(nobody);
        let matcher = if wildcard_first {
            matcher
                .route("/blog/*", [send_to("/blog")])
                .route("/blog/latest", [send_to("/blog/2024")])
        } else {
            matcher
                .route("/blog/latest", [send_to("/blog/2024")])
                .route("/blog/*", [send_to("/blog")])
        };

        let order: Vec<_> = matcher.patterns().collect();
        assert_eq!(order, ["/blog/latest", "/blog/*"]);

        let res = matcher.handle(Request::get("/blog/latest")).await.unwrap();
        assert_eq!(res.location(), Some("/blog/2024"));
        let res = matcher.handle(Request::get("/blog/older")).await.unwrap();
        assert_eq!(res.location(), Some("/blog"));
    }
}

#[tokio::test]
async fn test_protected_area_with_error_handler() {
    let matcher = LegacyMatcher::new(nobody)
        .protect(["/cms/*"])
        .route("/cms/*", [send_to("/never")])
        .on_error(|req, err| match err {
            GateError::Unauthenticated { .. } => {
                Response::redirect(format!("/sign-in?next={}", req.path))
            }
            _ => Response::new(500),
        });

    let res = matcher.handle(Request::get("/cms/pages")).await.unwrap();
    assert_eq!(res.location(), Some("/sign-in?next=/cms/pages"));
}

#[tokio::test]
async fn test_permanent_redirect_for_editors() {
    let matcher = LegacyMatcher::new(editor).protect(["/cms/*"]).route(
        "/cms/[page]",
        [legacy_rule(
            |ctx: &LegacyContext<User>, control: &mut LegacyControl| {
                let is_editor = ctx.data.as_ref().is_some_and(|u| u.roles.contains(&"editor".into()));
                if is_editor && ctx.params.get("page") == Some("home") {
                    control.redirect("/cms/dashboard", Some(RedirectOptions { status: 308 }));
                } else {
                    control.next();
                }
                Ok(())
            },
        )],
    );

    let res = matcher.handle(Request::get("/cms/home")).await.unwrap();
    assert_eq!(res.status, 308);
    assert_eq!(res.location(), Some("/cms/dashboard"));

    let res = matcher.handle(Request::get("/cms/other")).await.unwrap();
    assert!(res.is_pass_through());
}

#[tokio::test]
async fn test_unmatched_path_passes() {
    let matcher = LegacyMatcher::new(nobody).route("/blog/*", [send_to("/blog")]);
    let res = matcher.handle(Request::get("/about")).await.unwrap();
    assert!(res.is_pass_through());
}

#[tokio::test]
async fn test_bracket_and_wildcard_params_reach_rules() {
    let matcher = LegacyMatcher::new(nobody).route(
        "/org/[org]/files/*",
        [legacy_rule(
            |ctx: &LegacyContext<User>, control: &mut LegacyControl| {
                let org = ctx.params.get("org").unwrap_or_default();
                let file = ctx.params.get("*").unwrap_or_default();
                control.redirect(format!("/download/{org}/{file}"), None);
                Ok(())
            },
        )],
    );

    let res = matcher.handle(Request::get("/org/acme/files/x/y")).await.unwrap();
    assert_eq!(res.location(), Some("/download/acme/x/y"));
}
