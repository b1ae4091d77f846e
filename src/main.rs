use std::{env, fs, io, path::PathBuf, process::ExitCode, sync::Arc};

use async_trait::async_trait;
use flight_checkout::{
    domain::{RecomputeInputs, ShipmentRecord, ValidatedDiscount},
    infra::{
        ActiveDatesRequest, ActiveDatesResponse, ActiveDatesSource, BuyerContext,
        CollaboratorError, DiscountRequest, DiscountValidator, ShipmentLookup,
    },
    load_config, CheckoutSession, RecomputeOutcome,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use flight_checkout::util::version::{version_label, APP_NAME};

#[derive(Debug, Error)]
enum CliError {
    #[error("usage: flight-checkout quote <cart.json> [--buyer <id>] [--offline]")]
    Usage,
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid cart file: {0}")]
    Cart(#[from] serde_json::Error),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

struct QuoteArgs {
    cart: PathBuf,
    buyer: String,
    offline: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<QuoteArgs, CliError> {
    if args.next().as_deref() != Some("quote") {
        return Err(CliError::Usage);
    }
    let cart = args.next().map(PathBuf::from).ok_or(CliError::Usage)?;
    let mut parsed = QuoteArgs {
        cart,
        buyer: "guest".to_string(),
        offline: false,
    };
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--buyer" => parsed.buyer = args.next().ok_or(CliError::Usage)?,
            "--offline" => parsed.offline = true,
            _ => return Err(CliError::Usage),
        }
    }
    Ok(parsed)
}

/// Stand-in collaborators for `--offline`; every call fails so the session
/// takes its local fallbacks.
struct Offline;

#[async_trait]
impl ActiveDatesSource for Offline {
    async fn active_dates(
        &self,
        _request: &ActiveDatesRequest,
    ) -> Result<ActiveDatesResponse, CollaboratorError> {
        Err(CollaboratorError::Api("offline".into()))
    }
}

#[async_trait]
impl ShipmentLookup for Offline {
    async fn shipments(
        &self,
        _buyer: &BuyerContext,
        _status_filter: &[&str],
    ) -> Result<Vec<ShipmentRecord>, CollaboratorError> {
        Err(CollaboratorError::Api("offline".into()))
    }
}

#[async_trait]
impl DiscountValidator for Offline {
    async fn validate(
        &self,
        _request: &DiscountRequest<'_>,
    ) -> Result<ValidatedDiscount, CollaboratorError> {
        Err(CollaboratorError::Api("offline".into()))
    }
}

async fn run(args: QuoteArgs) -> Result<Option<String>, CliError> {
    let raw = fs::read_to_string(&args.cart).map_err(|source| CliError::Read {
        path: args.cart.clone(),
        source,
    })?;
    let inputs: RecomputeInputs = serde_json::from_str(&raw)?;

    let config = load_config();
    let session = if args.offline {
        let offline = Arc::new(Offline);
        CheckoutSession::new(&config, offline.clone(), offline.clone(), offline)
    } else {
        CheckoutSession::with_storefront(&config)?
    };

    let buyer = BuyerContext {
        buyer_id: args.buyer,
    };
    match session
        .recompute(&inputs, &buyer, OffsetDateTime::now_utc())
        .await
    {
        RecomputeOutcome::Completed(quote) => Ok(Some(serde_json::to_string_pretty(&quote)?)),
        RecomputeOutcome::Duplicate | RecomputeOutcome::Superseded => Ok(None),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{APP_NAME} {}\n{err}", version_label());
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(Some(json)) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "quote failed");
            ExitCode::FAILURE
        }
    }
}
