use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use medicine_finder::config::lambda::LambdaConfig;
use medicine_finder::core::identification::IdentificationService;
use medicine_finder::domain::model::{IdentificationResult, IdentifyRequest};
use medicine_finder::utils::{logger, validation::Validate};
use medicine_finder::build_service;
use std::sync::Arc;

async fn function_handler(
    service: &IdentificationService,
    event: LambdaEvent<IdentifyRequest>,
) -> Result<IdentificationResult, Error> {
    tracing::info!("Starting identify Lambda function");

    let identification = service
        .identify(&event.payload)
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    tracing::info!(
        "Identify Lambda function completed ({} products, source: {})",
        identification.result.products.len(),
        identification.provenance.as_str()
    );
    Ok(identification.result)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    // 冷啟動時建立一次，之後的呼叫共用
    let config = LambdaConfig::from_env();
    config.validate()?;
    let service: Arc<IdentificationService> = build_service(&config)?;

    run(service_fn(move |event: LambdaEvent<IdentifyRequest>| {
        let service = Arc::clone(&service);
        async move { function_handler(&service, event).await }
    }))
    .await
}
