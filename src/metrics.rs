pub fn register_metrics() {
    // Descriptions of labeled metrics
    metrics::describe_gauge!(
        "dormbot_service_access_success",
        "1 if the last access to the service was successful, 0 otherwise."
    );
    metrics::describe_gauge!(
        "dormbot_service_last_access_timestamp_seconds",
        "UNIX timestamp of the last access to the service."
    );
    metrics::describe_counter!(
        "dormbot_notifications_total",
        "Notifications pushed through the chat transport."
    );

    // Constant metrics

    // dormbot_start_time_seconds
    metrics::describe_gauge!(
        "dormbot_start_time_seconds",
        "Unix timestamp of the bot start time."
    );
    metrics::gauge!(
        "dormbot_start_time_seconds",
        std::time::UNIX_EPOCH.elapsed().unwrap_or_default().as_secs_f64(),
    );

    // dormbot_build_info
    metrics::describe_gauge!(
        "dormbot_build_info",
        "A metric with a constant '1' value with the dormbot build information."
    );
    metrics::gauge!(
        "dormbot_build_info",
        1.0,
        "revision" => crate::VERSION,
    );
}

pub fn update_service(name: &'static str, success: bool) {
    metrics::gauge!(
        "dormbot_service_access_success",
        if success { 1.0 } else { 0.0 },
        "service" => name,
    );
    metrics::gauge!(
        "dormbot_service_last_access_timestamp_seconds",
        std::time::UNIX_EPOCH.elapsed().unwrap_or_default().as_secs_f64(),
        "service" => name,
        "status" => if success { "success" } else { "failure" },
    );
}

pub fn count_notification(kind: &'static str, success: bool) {
    metrics::increment_counter!(
        "dormbot_notifications_total",
        "type" => kind,
        "status" => if success { "success" } else { "failure" },
    );
}
