//! Melhor Envio quote client.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use atelier::shipping::{CarrierQuote, Package, PostalCode};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::{
    domain::shipping::carrier::{CarrierClient, CarrierError},
    settings::CarrierSettings,
};

const CALCULATE_PATH: &str = "/api/v2/me/shipment/calculate";
const USER_AGENT: &str = concat!("atelier/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct QuoteBody {
    from: Address,
    to: Address,
    products: Vec<Product>,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Address {
    postal_code: String,
}

#[derive(Debug, Serialize)]
struct Product {
    id: String,
    width: u32,
    height: u32,
    length: u32,
    weight: f64,
    insurance_value: f64,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct Options {
    receipt: bool,
    own_hand: bool,
}

fn quote_body(origin: &PostalCode, destination: &PostalCode, packages: &[Package]) -> QuoteBody {
    QuoteBody {
        from: Address {
            postal_code: origin.digits().to_string(),
        },
        to: Address {
            postal_code: destination.digits().to_string(),
        },
        products: packages
            .iter()
            .enumerate()
            .map(|(index, package)| Product {
                id: index.to_string(),
                width: package.width_cm,
                height: package.height_cm,
                length: package.length_cm,
                weight: package.weight_kg().to_f64().unwrap_or_default(),
                insurance_value: package.insurance_major().to_f64().unwrap_or_default(),
                quantity: package.quantity,
            })
            .collect(),
        options: Options {
            receipt: false,
            own_hand: false,
        },
    }
}

/// HTTP client for the carrier's quote endpoint, retrying transient failures.
#[derive(Debug, Clone)]
pub struct MelhorEnvioClient {
    api_base: String,
    token: Zeroizing<String>,
    max_retries: u32,
    retry_base_delay: Duration,
    http: Client,
}

impl MelhorEnvioClient {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError::Transport`] if the HTTP client cannot be built.
    pub fn new(settings: &CarrierSettings) -> Result<Self, CarrierError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(CarrierError::Transport)?;

        Ok(Self {
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            max_retries: settings.max_retries,
            retry_base_delay: settings.retry_base_delay,
            http,
        })
    }

    async fn attempt(&self, body: &QuoteBody) -> Result<Vec<CarrierQuote>, CarrierError> {
        let response = self
            .http
            .post(format!("{}{CALCULATE_PATH}", self.api_base))
            .bearer_auth(self.token.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(CarrierError::Transport)?;

        let status = response.status();

        if status.is_server_error() {
            return Err(CarrierError::Unavailable {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();

            return Err(CarrierError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(CarrierError::Decode)
    }

    /// Doubling delays from the base, at most `max_retries` extra attempts.
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_base_delay)
            .with_factor(2.0)
            .with_max_times(usize::try_from(self.max_retries).unwrap_or(usize::MAX))
    }
}

#[async_trait]
impl CarrierClient for MelhorEnvioClient {
    #[tracing::instrument(skip(self, packages), fields(%origin, %destination, packages = packages.len()))]
    async fn quote(
        &self,
        origin: PostalCode,
        destination: PostalCode,
        packages: Vec<Package>,
    ) -> Result<Vec<CarrierQuote>, CarrierError> {
        let body = quote_body(&origin, &destination, &packages);

        (|| self.attempt(&body))
            .retry(self.backoff())
            .when(CarrierError::is_retryable)
            .notify(|error, delay| {
                tracing::warn!(%error, ?delay, "carrier quote failed; retrying");
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use backon::BackoffBuilder;
    use testresult::TestResult;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use crate::settings::AppSettings;

    use super::*;

    /// Serve `responses` in order, one connection each, and count the requests seen.
    async fn canned_carrier(responses: Vec<(u16, &'static str)>) -> TestResult<(String, Arc<AtomicUsize>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = format!("http://{}", listener.local_addr()?);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buffer = vec![0_u8; 16 * 1024];
                let _read = socket.read(&mut buffer).await;

                counter.fetch_add(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _written = socket.write_all(response.as_bytes()).await;
            }
        });

        Ok((address, seen))
    }

    fn client(api_base: String, max_retries: u32) -> TestResult<MelhorEnvioClient> {
        let mut settings = AppSettings::for_tests().carrier;

        settings.api_base = api_base;
        settings.max_retries = max_retries;

        Ok(MelhorEnvioClient::new(&settings)?)
    }

    fn route() -> TestResult<(PostalCode, PostalCode)> {
        Ok(("01001-000".parse()?, "20040-020".parse()?))
    }

    #[test]
    fn body_uses_digits_and_major_units() -> TestResult {
        let (origin, destination) = route()?;
        let body = quote_body(&origin, &destination, &[Package {
            insurance_value: 12_990,
            quantity: 2,
            ..Package::DEFAULT
        }]);

        let json = serde_json::to_value(&body)?;

        assert_eq!(json["from"]["postal_code"], "01001000");
        assert_eq!(json["to"]["postal_code"], "20040020");
        assert_eq!(json["products"][0]["weight"], 1.0);
        assert_eq!(json["products"][0]["insurance_value"], 129.9);
        assert_eq!(json["products"][0]["quantity"], 2);

        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_retried() -> TestResult {
        let (api_base, seen) = canned_carrier(vec![
            (503, "{}"),
            (502, "{}"),
            (200, r#"[{"id": 1, "name": "PAC", "price": "23.50", "delivery_time": 6}]"#),
        ])
        .await?;
        let (origin, destination) = route()?;

        let quotes = client(api_base, 3)?
            .quote(origin, destination, vec![Package::DEFAULT])
            .await?;

        assert_eq!(quotes.len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        Ok(())
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() -> TestResult {
        let (api_base, seen) = canned_carrier(vec![(422, r#"{"message": "invalid"}"#), (200, "[]")]).await?;
        let (origin, destination) = route()?;

        let result = client(api_base, 3)?
            .quote(origin, destination, vec![Package::DEFAULT])
            .await;

        assert!(
            matches!(result, Err(CarrierError::Rejected { status: 422, .. })),
            "expected Rejected, got {result:?}"
        );
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[test]
    fn backoff_doubles_from_the_base_delay() -> TestResult {
        let mut settings = AppSettings::for_tests().carrier;

        settings.max_retries = 3;
        settings.retry_base_delay = Duration::from_millis(250);

        let delays: Vec<Duration> = MelhorEnvioClient::new(&settings)?.backoff().build().collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_millis(1_000),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn retries_stop_at_the_limit() -> TestResult {
        let (api_base, seen) = canned_carrier(vec![(500, "{}"), (500, "{}"), (500, "{}")]).await?;
        let (origin, destination) = route()?;

        let result = client(api_base, 1)?
            .quote(origin, destination, vec![Package::DEFAULT])
            .await;

        assert!(
            matches!(result, Err(CarrierError::Unavailable { status: 500 })),
            "expected Unavailable, got {result:?}"
        );
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        Ok(())
    }
}
