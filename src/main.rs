use clap::Parser;
use elastic_pusher::utils::error::{ErrorSeverity, PusherError};
use elastic_pusher::core::pusher::LogForwarder;
use elastic_pusher::utils::logger::{self, ForwardLayer};
use elastic_pusher::utils::validation::Validate;
use elastic_pusher::{CliConfig, ElasticSink, LocalStorage, PushOutcome, Pusher, Settings};
use std::sync::Arc;

fn exit_with(e: &PusherError) -> ! {
    tracing::error!(
        "❌ elasticPusher failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::parse();

    // 初始化日誌
    let (forward_layer, forwarded_logs) = match config.forward_level() {
        Some(level) => {
            let (layer, logs) = ForwardLayer::new(level);
            (Some(layer), Some(logs))
        }
        None => (None, None),
    };
    if config.json_logs {
        logger::init_json_logger(config.log_options(), forward_layer);
    } else {
        logger::init_cli_logger(config.log_options(), forward_layer);
    }

    tracing::info!("Running elasticPusher v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("CLI config: {:?}", config);

    // 驗證參數
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    // 載入設定檔
    let settings = match Settings::load_or_default(&config.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load settings file '{}': {}", config.config, e);
            exit_with(&e);
        }
    };
    if let Err(e) = settings.validate() {
        exit_with(&e);
    }
    config.project = settings.resolve_project(&config.project);

    let sink = match ElasticSink::new(&settings) {
        Ok(sink) => sink,
        Err(e) => exit_with(&e),
    };
    tracing::info!("Using {} as elasticsearch server", sink.base_url());

    let pusher = Arc::new(Pusher::new(LocalStorage::default(), sink, config));
    let forwarder = forwarded_logs.map(|logs| LogForwarder::spawn(Arc::clone(&pusher), logs));

    let result = pusher.push_file().await;
    match &result {
        Ok(PushOutcome::Pushed { documents }) => {
            tracing::info!("✅ Pushed {} document(s)", documents);
        }
        Ok(PushOutcome::Failed(e)) => {
            // 推送失敗已記錄, 程式照常結束
            tracing::warn!("💡 {}", e.recovery_suggestion());
        }
        Ok(PushOutcome::Skipped) | Err(_) => {}
    }

    // 結束前送出所有待轉送的日誌
    if let Some(forwarder) = forwarder {
        let forwarded = forwarder.shutdown().await;
        tracing::debug!("Forwarded {} log line(s)", forwarded);
    }

    if let Err(e) = result {
        exit_with(&e);
    }

    Ok(())
}
