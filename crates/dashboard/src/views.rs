//! HTML rendering for the dashboard pages

use dashboard_lib::{ContainerState, DisplayMetric, Overview, PodSummary, WorkloadView};
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;margin-bottom:1.5em}\
td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
.phase-Running{color:#2a7}.phase-Failed,.phase-Error{color:#c33}\
.phase-Pending{color:#b80}pre{background:#f4f4f4;padding:1em;overflow:auto}";

/// Escape text for use in HTML bodies and attribute values
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{}</style></head><body>{}</body></html>",
        escape(title),
        STYLE,
        body
    )
}

/// Index page: workloads with their pods, node utilization, bulk actions
pub fn render_index(overview: &Overview, alerts_enabled: bool) -> String {
    let mut body = String::from("<h1>Cluster Dashboard</h1>");

    let _ = write!(
        body,
        "<form method=\"post\" action=\"/toggle-error-check\">\
         <p>Error alerting is <strong>{}</strong> \
         <button type=\"submit\">{}</button></p></form>\
         <form method=\"post\" action=\"/delete-error-completed-pods\">\
         <button type=\"submit\">Delete failed and completed pods</button></form>",
        if alerts_enabled { "enabled" } else { "disabled" },
        if alerts_enabled { "Disable" } else { "Enable" },
    );

    body.push_str("<h2>Deployments</h2>");
    if overview.workloads.is_empty() {
        body.push_str("<p>No deployments found.</p>");
    }
    for view in &overview.workloads {
        render_workload(&mut body, view);
    }

    body.push_str("<h2>Nodes</h2>");
    render_node_metrics(&mut body, &overview.node_metrics);

    page("Cluster Dashboard", &body)
}

fn render_workload(body: &mut String, view: &WorkloadView) {
    let w = &view.workload;
    let ns = escape(&w.namespace);
    let name = escape(&w.name);

    let _ = write!(
        body,
        "<h3>{ns}/{name}</h3>\
         <p>Replicas: {ready}/{desired} ready</p>\
         <form method=\"post\" action=\"/scale\">\
         <input type=\"hidden\" name=\"namespace\" value=\"{ns}\">\
         <input type=\"hidden\" name=\"deployment_name\" value=\"{name}\">\
         <input type=\"number\" name=\"replicas\" min=\"0\" value=\"{desired}\">\
         <button type=\"submit\">Scale</button></form>\
         <form method=\"post\" action=\"/restart\">\
         <input type=\"hidden\" name=\"namespace\" value=\"{ns}\">\
         <input type=\"hidden\" name=\"deployment_name\" value=\"{name}\">\
         <button type=\"submit\">Restart rollout</button></form>",
        ready = w.ready_replicas,
        desired = w.replicas,
    );

    body.push_str(
        "<table><tr><th>Pod</th><th>Phase</th><th>Node</th>\
         <th>Restarts</th><th>Containers</th><th>Logs</th></tr>",
    );
    for pod in &view.pods {
        render_pod_row(body, pod);
    }
    body.push_str("</table>");
}

fn render_pod_row(body: &mut String, pod: &PodSummary) {
    let containers = pod
        .containers
        .iter()
        .map(|c| format!("{}: {}", escape(&c.name), describe_state(&c.state)))
        .collect::<Vec<_>>()
        .join("<br>");

    let _ = write!(
        body,
        "<tr><td>{name}</td><td class=\"phase-{phase}\">{phase}</td><td>{node}</td>\
         <td>{restarts}</td><td>{containers}</td><td>\
         <form method=\"post\" action=\"/logs\">\
         <input type=\"hidden\" name=\"namespace\" value=\"{ns}\">\
         <input type=\"hidden\" name=\"pod_name\" value=\"{name}\">\
         <button type=\"submit\">View</button></form></td></tr>",
        name = escape(&pod.name),
        ns = escape(&pod.namespace),
        phase = pod.phase,
        node = escape(pod.node_name.as_deref().unwrap_or("-")),
        restarts = pod.restart_count(),
    );
}

fn describe_state(state: &ContainerState) -> String {
    match state {
        ContainerState::Waiting { reason, .. } => {
            format!("waiting ({})", escape(reason.as_deref().unwrap_or("unknown")))
        }
        ContainerState::Running => "running".to_string(),
        ContainerState::Terminated { reason, exit_code } => format!(
            "terminated ({}, exit {})",
            escape(reason.as_deref().unwrap_or("unknown")),
            exit_code
        ),
        ContainerState::Unknown => "unknown".to_string(),
    }
}

fn render_node_metrics(body: &mut String, metrics: &[DisplayMetric]) {
    if metrics.is_empty() {
        body.push_str("<p>No node metrics available.</p>");
        return;
    }

    body.push_str(
        "<table><tr><th>Node</th><th>CPU</th><th>CPU %</th>\
         <th>Memory</th><th>Memory %</th></tr>",
    );
    for m in metrics {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&m.name),
            escape(&m.cpu_usage),
            escape(&m.cpu_usage_percent),
            escape(&m.memory_usage),
            escape(&m.memory_usage_percent),
        );
    }
    body.push_str("</table>");
}

/// Log page for a single pod
pub fn render_logs(namespace: &str, pod_name: &str, logs: Option<&str>) -> String {
    let content = match logs {
        Some(text) => format!("<pre>{}</pre>", escape(text)),
        None => "<p>Logs are unavailable for this pod.</p>".to_string(),
    };
    let body = format!(
        "<h1>Logs: {}/{}</h1><p><a href=\"/\">Back</a></p>{}",
        escape(namespace),
        escape(pod_name),
        content
    );
    page("Pod logs", &body)
}
