//! Voting form and results

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::fmt::Write;

use crate::config::AppState;
use crate::http;

/// Serve the voting form
pub fn serve_home(state: &AppState, is_head: bool) -> Response<Full<Bytes>> {
    http::build_html_response(render_form(&state.ballot.choices()), is_head)
}

/// Serve the current tally as JSON
pub fn serve_result(state: &AppState, is_head: bool) -> Response<Full<Bytes>> {
    http::build_json_response(StatusCode::OK, &state.ballot.tally(), is_head)
}

/// Render the HTML form with one radio button per choice
pub fn render_form(choices: &[String]) -> String {
    let mut html = String::from(
        "<h2>Vote for your favorite language</h2>\n\
         <form action=\"/vote\" method=\"post\">\n",
    );
    for choice in choices {
        let name = escape_html(choice);
        let _ = writeln!(
            html,
            "    <input type=\"radio\" name=\"language\" value=\"{name}\"> {name}<br>"
        );
    }
    html.push_str(
        "    <input type=\"submit\" value=\"Vote\">\n\
         </form>\n\
         <br>\n\
         <a href='/result'>View Results (JSON)</a>\n",
    );
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
