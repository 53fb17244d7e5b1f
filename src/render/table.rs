//! # Counterfactual HTML Tables
//!
//! The HTML artifact of the schema-counterfactual method: the query instance
//! followed by its counterfactual rows, or an explicit notice when the
//! search came up empty.

/// Build the per-instance HTML section for counterfactual results
pub fn counterfactual_table_html(
    feature_names: &[String],
    instance: &[f64],
    counterfactuals: &[Vec<f64>],
) -> String {
    let mut html = String::new();
    html.push_str("<h2>Instance 1</h2>");
    html.push_str(&table(feature_names, std::slice::from_ref(&instance.to_vec())));
    html.push_str("<h2>Counterfactuals</h2>");
    if counterfactuals.is_empty() {
        html.push_str(
            "<h3>No counterfactuals were found for this instance. \
             Perhaps try with different features.</h3>",
        );
    } else {
        html.push_str(&table(feature_names, counterfactuals));
    }
    html.push_str("<br><br><hr><br>");
    html
}

fn table(feature_names: &[String], rows: &[Vec<f64>]) -> String {
    let mut html = String::from("<table border=\"1\"><thead><tr>");
    for name in feature_names {
        html.push_str("<th>");
        html.push_str(&escape(name));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for value in row {
            html.push_str("<td>");
            html.push_str(&format_value(*value));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn format_value(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.4}", v)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
