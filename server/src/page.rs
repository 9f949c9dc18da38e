//! The single HTML control page.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::scores::ShooterRecord;

const SCRIPT: &str = r#"
async function post(path, body) {
  const res = await fetch(path, { method: "POST", body });
  return res.json();
}
async function captureBackground() {
  const out = await post("/capture_background");
  document.getElementById("status").textContent =
    out.success ? "Background captured" : (out.error || "Capture failed");
}
async function registerHit(shooter) {
  const body = new URLSearchParams({ shooter });
  const out = await post("/register_hit", body);
  if (out.success) {
    location.reload();
  } else {
    document.getElementById("status").textContent = out.error || "Request failed";
  }
}
"#;

pub fn render_index(shooters: &BTreeMap<String, ShooterRecord>, background_set: bool) -> String {
    let mut rows = String::new();
    for (name, record) in shooters {
        let shots = record
            .shots
            .iter()
            .map(|shot| {
                format!(
                    r#"<a href="/screenshots/{}">{}</a>"#,
                    encode_path_segment(shot),
                    escape_html(shot)
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let name_html = escape_html(name);
        // Writing to a String cannot fail.
        let _ = write!(
            rows,
            r#"<tr>
  <td>{name_html}</td>
  <td>{score}</td>
  <td><button data-shooter="{name_html}" onclick="registerHit(this.dataset.shooter)">Register hit</button></td>
  <td>{shots}</td>
  <td><form method="post" action="/remove_shooter"><input type="hidden" name="name" value="{name_html}"><button>Remove</button></form></td>
</tr>
"#,
            score = record.score,
        );
    }

    let background = if background_set {
        "Background set"
    } else {
        "No background set"
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Hitboard</title>
<style>
body {{ font-family: sans-serif; margin: 1.5em; }}
table {{ border-collapse: collapse; margin-top: 1em; }}
td, th {{ border: 1px solid #ccc; padding: 0.3em 0.6em; }}
#status {{ margin-left: 1em; font-weight: bold; }}
</style>
</head>
<body>
<h1>Hitboard</h1>
<img src="/video_feed" alt="live camera" width="640">
<p><button onclick="captureBackground()">Capture background</button><span id="status">{background}</span></p>
<table>
<tr><th>Shooter</th><th>Score</th><th></th><th>Shots</th><th></th></tr>
{rows}</table>
<form method="post" action="/add_shooter">
  <input name="name" placeholder="Shooter name" required>
  <button>Add shooter</button>
</form>
<form method="post" action="/reset_scores" onsubmit="return confirm('Reset all scores?')">
  <button>Reset scores</button>
</form>
<script>{SCRIPT}</script>
</body>
</html>
"#
    )
}

pub fn escape_html(s: &str) -> String {
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

/// Percent-encode everything except RFC 3986 unreserved characters.
pub fn encode_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn encodes_spaces_in_links() {
        assert_eq!(encode_path_segment("a b_1.jpg"), "a%20b_1.jpg");
    }

    #[test]
    fn lists_shooters_and_shots() {
        let mut shooters = BTreeMap::new();
        shooters.insert(
            "Ann Lee".to_string(),
            ShooterRecord {
                score: 7,
                shots: vec!["Ann Lee_20240101_120000.jpg".to_string()],
            },
        );
        shooters.insert("<script>".to_string(), ShooterRecord::default());

        let html = render_index(&shooters, true);
        assert!(html.contains("<td>Ann Lee</td>"));
        assert!(html.contains("<td>7</td>"));
        assert!(html.contains(">Background set<"));
        assert!(html.contains(r#"href="/screenshots/Ann%20Lee_20240101_120000.jpg""#));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<td><script></td>"));
    }

    #[test]
    fn empty_book_still_renders_controls() {
        let html = render_index(&BTreeMap::new(), false);
        assert!(html.contains("No background set"));
        assert!(html.contains(r#"action="/add_shooter""#));
        assert!(html.contains(r#"src="/video_feed""#));
    }
}
