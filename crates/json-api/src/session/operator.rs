//! Operator authorisation.

use salvo::prelude::*;

use crate::{extensions::*, session::bearer_token};

/// Let the request through only when the session middleware recognised the operator token.
#[salvo::handler]
pub(crate) async fn require_operator(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let operator = match depot.visitor_or_500() {
        Ok(visitor) => visitor.operator,
        Err(status) => {
            res.render(status);

            return;
        }
    };

    if operator {
        ctrl.call_next(req, depot, res).await;

        return;
    }

    let status = if bearer_token(req).is_some() {
        StatusError::forbidden().brief("FORBIDDEN: operator token required")
    } else {
        StatusError::unauthorized().brief("UNAUTHORIZED: operator token required")
    };

    res.render(status);
    ctrl.skip_rest();
}

#[cfg(test)]
mod tests {
    use salvo::{
        affix_state::inject,
        http::header::AUTHORIZATION,
        test::TestClient,
    };
    use testresult::TestResult;

    use crate::{
        session::middleware,
        test_helpers::{OPERATOR_TOKEN, Mocks},
    };

    use super::*;

    #[salvo::handler]
    async fn ok() -> &'static str {
        "ok"
    }

    fn make_service() -> Service {
        Service::new(
            Router::new()
                .hoop(inject(Mocks::default().into_state()))
                .hoop(middleware::handler)
                .hoop(require_operator)
                .push(Router::new().post(ok)),
        )
    }

    #[tokio::test]
    async fn operator_token_passes() -> TestResult {
        let res = TestClient::post("http://example.com")
            .add_header(AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"), true)
            .send(&make_service())
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }

    #[tokio::test]
    async fn missing_token_returns_401() -> TestResult {
        let res = TestClient::post("http://example.com")
            .send(&make_service())
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }
}
