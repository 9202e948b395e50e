//! Session middleware.

use std::sync::Arc;

use atelier::errors::{Categorised, ErrorKind};
use atelier_app::domain::carts::records::CartOwner;
use salvo::{
    http::cookie::{Cookie, SameSite},
    prelude::*,
};
use subtle::ConstantTimeEq;
use tracing::error;
use uuid::Uuid;

use crate::{
    extensions::*,
    session::{CART_SESSION_COOKIE, Visitor, bearer_token, is_session_id},
    state::State,
};

/// Resolve the [`Visitor`] from the bearer token or the `cart_session` cookie, issuing the
/// cookie to anonymous visitors that lack one.
#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let state = match depot.obtain_or_500::<Arc<State>>() {
        Ok(state) => Arc::clone(state),
        Err(status) => {
            res.render(status);

            return;
        }
    };

    let session = req
        .cookie(CART_SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| is_session_id(value));

    let mut operator = false;
    let mut user = None;

    if let Some(token) = bearer_token(req) {
        if is_operator_token(&state, token) {
            operator = true;
        } else {
            match state.users.authenticate_bearer(token.to_owned()).await {
                Ok(record) => user = Some(record.uuid),
                Err(auth_error) if auth_error.kind() == ErrorKind::Internal => {
                    error!("failed to authenticate bearer token: {auth_error}");

                    res.render(StatusError::internal_server_error());

                    return;
                }
                Err(_) => {
                    res.render(StatusError::unauthorized().brief("Invalid API token"));

                    return;
                }
            }
        }
    }

    let owner = match (user, &session) {
        (Some(user), _) => CartOwner::User(user),
        (None, Some(session)) => CartOwner::Session(session.clone()),
        (None, None) => {
            let issued = Uuid::new_v4().simple().to_string();

            res.add_cookie(
                Cookie::build((CART_SESSION_COOKIE, issued.clone()))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .permanent()
                    .build(),
            );

            CartOwner::Session(issued)
        }
    };

    depot.insert_visitor(Visitor {
        owner,
        session,
        operator,
    });

    ctrl.call_next(req, depot, res).await;
}

fn is_operator_token(state: &State, token: &str) -> bool {
    let expected = state.operator_token.as_bytes();

    !expected.is_empty() && bool::from(expected.ct_eq(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use atelier_app::domain::users::{
        MockUsersService, UsersServiceError,
        records::{UserRecord, UserUuid},
    };
    use jiff::Timestamp;
    use salvo::{
        affix_state::inject,
        http::header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        test::{ResponseExt, TestClient},
    };
    use testresult::TestResult;

    use crate::test_helpers::{OPERATOR_TOKEN, Mocks, TEST_SESSION};

    use super::*;

    #[salvo::handler]
    async fn echo_visitor(depot: &mut Depot, res: &mut Response) {
        let visitor = depot.visitor_or_500().map_or_else(
            |_| "missing".to_string(),
            |visitor| format!("{} operator={}", visitor.owner, visitor.operator),
        );

        res.render(visitor);
    }

    fn make_service(users: MockUsersService) -> Service {
        let state = Mocks {
            users,
            ..Mocks::default()
        }
        .into_state();

        Service::new(
            Router::new()
                .hoop(inject(state))
                .hoop(handler)
                .push(Router::new().get(echo_visitor)),
        )
    }

    fn strict_users() -> MockUsersService {
        let mut users = MockUsersService::new();

        users.expect_authenticate_bearer().never();

        users
    }

    #[tokio::test]
    async fn anonymous_visitor_is_issued_a_session_cookie() -> TestResult {
        let mut res = TestClient::get("http://example.com")
            .send(&make_service(strict_users()))
            .await;

        let cookie = res
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .unwrap_or_default();

        let body = res.take_string().await?;

        assert!(cookie.starts_with("cart_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(body.starts_with("session:"));
        assert!(body.ends_with("operator=false"));

        Ok(())
    }

    #[tokio::test]
    async fn existing_session_cookie_is_reused() -> TestResult {
        let mut res = TestClient::get("http://example.com")
            .add_header(COOKIE, format!("cart_session={TEST_SESSION}"), true)
            .send(&make_service(strict_users()))
            .await;

        assert!(res.headers().get(SET_COOKIE).is_none());
        assert_eq!(
            res.take_string().await?,
            format!("session:{TEST_SESSION} operator=false")
        );

        Ok(())
    }

    #[tokio::test]
    async fn valid_bearer_token_resolves_the_user() -> TestResult {
        let uuid = UserUuid::new();

        let mut users = MockUsersService::new();

        users
            .expect_authenticate_bearer()
            .once()
            .withf(|token| token == "atl_abc123")
            .return_once(move |_| {
                Ok(UserRecord {
                    uuid,
                    email: "ana@example.com".to_string(),
                    name: "Ana".to_string(),
                    created_at: Timestamp::UNIX_EPOCH,
                })
            });

        let mut res = TestClient::get("http://example.com")
            .add_header(AUTHORIZATION, "Bearer atl_abc123", true)
            .send(&make_service(users))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(res.take_string().await?, format!("user:{uuid} operator=false"));

        Ok(())
    }

    #[tokio::test]
    async fn invalid_bearer_token_returns_401() -> TestResult {
        let mut users = MockUsersService::new();

        users
            .expect_authenticate_bearer()
            .once()
            .return_once(|_| Err(UsersServiceError::InvalidToken));

        let res = TestClient::get("http://example.com")
            .add_header(AUTHORIZATION, "Bearer nope", true)
            .send(&make_service(users))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }

    #[tokio::test]
    async fn operator_token_is_recognised_without_a_user_lookup() -> TestResult {
        let mut res = TestClient::get("http://example.com")
            .add_header(AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"), true)
            .add_header(COOKIE, format!("cart_session={TEST_SESSION}"), true)
            .send(&make_service(strict_users()))
            .await;

        assert_eq!(
            res.take_string().await?,
            format!("session:{TEST_SESSION} operator=true")
        );

        Ok(())
    }
}
