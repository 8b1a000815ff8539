use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    fmt::{
        self,
        format::{Format, Full},
        time::SystemTime,
    },
    prelude::*,
};

fn base_format() -> Format<Full, SystemTime> {
    fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_thread_names(true)
}

pub fn setup_logging(base_log_dir: &str) {
    let filter = Targets::new()
        .with_target("sqlx", Level::INFO)
        .with_target("hyper", Level::INFO)
        .with_target("tower_http", Level::INFO)
        .with_default(Level::DEBUG);

    let stdout_layer = fmt::layer().event_format(base_format().with_ansi(true));

    let subscriber = tracing_subscriber::registry().with(filter).with(stdout_layer);

    if base_log_dir.is_empty() {
        subscriber.init();
    } else {
        let file_layer = fmt::layer()
            .event_format(base_format())
            .with_writer(tracing_appender::rolling::daily(base_log_dir, "moneyflow.log"));
        let json_file_layer = fmt::layer()
            .event_format(base_format().json())
            .with_writer(tracing_appender::rolling::daily(
                format!("{}/structured", base_log_dir),
                "moneyflow.log",
            ));
        subscriber.with(file_layer).with(json_file_layer).init();
    }
}
