use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use grounded_query_runner::models::request::ReasoningEffort;
use grounded_query_runner::utils::logging;
use grounded_query_runner::{
    run_item, AppResult, BatchJob, BatchScheduler, Config, HttpAdapterFactory, ItemStatus,
    ProviderKind, ResultSink, RunCtx, RunRequest,
};

#[tokio::main]
async fn main() -> ExitCode {
    // 加载配置并初始化日志
    let config = Config::from_env();
    logging::init(config.verbose_logging);

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("run") if args.len() == 4 => run_single(&config, &args[2], &args[3]).await,
        Some("batch") if args.len() == 3 => run_batch(&config, &args[2]).await,
        _ => {
            eprintln!("用法:");
            eprintln!("  {} run <文档A> <文档B>", args[0]);
            eprintln!("  {} batch <作业.toml>", args[0]);
            ExitCode::from(5)
        }
    }
}

/// 单次运行模式：处理一对文档，退出码即校验结论
async fn run_single(config: &Config, file_a: &str, file_b: &str) -> ExitCode {
    logging::log_startup(&config.provider, &config.model);

    let request = match build_request(config, file_a, file_b).await {
        Ok(request) => request,
        Err(e) => {
            error!("❌ 请求构建失败: {}", e);
            return ExitCode::from(5);
        }
    };

    let factory = HttpAdapterFactory::new(config);
    let sink = ResultSink::new(config.output_dir.clone());
    let ctx = RunCtx::new(0);

    let status = run_item(&ctx, &request, &factory, &sink, None).await;
    report_single(&status);
    ExitCode::from(status.exit_code())
}

/// 构建单次运行的请求（结构性错误在任何网络调用之前失败）
async fn build_request(config: &Config, file_a: &str, file_b: &str) -> AppResult<RunRequest> {
    let file_a_content = tokio::fs::read_to_string(file_a)
        .await
        .map_err(|e| grounded_query_runner::AppError::file_read_failed(file_a, e))?;
    let file_b_content = tokio::fs::read_to_string(file_b)
        .await
        .map_err(|e| grounded_query_runner::AppError::file_read_failed(file_b, e))?;

    let request = RunRequest::new(
        file_a_content,
        file_b_content,
        config.resolve_prompt_template()?,
        ProviderKind::parse(&config.provider)?,
        config.model.clone(),
        ReasoningEffort::parse_or_default(&config.reasoning_effort),
        config.max_completion_tokens,
        config.include_fields.clone(),
    )?;
    Ok(request)
}

/// 终端摘要：成功打印产物路径，失败打印一行式失败说明
fn report_single(status: &ItemStatus) {
    match status {
        ItemStatus::Success { artifact_paths } => {
            info!("✅ 校验通过");
            for path in artifact_paths {
                info!("📄 {}", path);
            }
        }
        ItemStatus::Failure { message, exit_code, .. } => {
            error!("❌ {} (退出码 {})", message, exit_code);
        }
        ItemStatus::Cancelled => {
            error!("🚫 运行被取消 (退出码 5)");
        }
    }
}

/// 批处理模式：TOML 作业文件，Ctrl+C 触发协作式取消
async fn run_batch(config: &Config, job_path: &str) -> ExitCode {
    let job = match BatchJob::load(job_path, config).await {
        Ok(job) => job,
        Err(e) => {
            error!("❌ 批处理作业加载失败: {}", e);
            return ExitCode::from(5);
        }
    };

    if let Err(e) = logging::init_log_file(&config.output_log_file) {
        error!("❌ 初始化日志文件失败: {}", e);
        return ExitCode::from(5);
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🚫 收到 Ctrl+C，开始协作式取消");
            signal_token.cancel();
        }
    });

    let scheduler = BatchScheduler::new(
        Arc::new(HttpAdapterFactory::new(config)),
        Arc::new(ResultSink::new(config.output_dir.clone())),
    );
    let results = scheduler.run_batch(job, cancel).await;

    let lines: Vec<String> = results.iter().map(|r| r.to_line()).collect();
    if config.output_format == "json" {
        let records: Vec<serde_json::Value> = results.iter().map(|r| r.to_record()).collect();
        match serde_json::to_string_pretty(&records) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("❌ 序列化结果失败: {}", e),
        }
    } else {
        for line in &lines {
            println!("{}", line);
        }
    }
    if let Err(e) = logging::append_log_lines(&config.output_log_file, &lines) {
        error!("⚠️ 写出日志文件失败: {}", e);
    }

    let all_success = results
        .iter()
        .all(|r| matches!(r.status, ItemStatus::Success { .. }));
    if all_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(5)
    }
}
