// src/game/template.rs
use super::GameType;

/// Minimal playable page written into every freshly created game.
pub fn starter_html(name: &str, game_type: GameType) -> String {
    let title = escape_html(name);
    let context = match game_type {
        GameType::TwoD => "2d",
        GameType::ThreeD => "webgl",
    };
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  html, body {{ margin: 0; height: 100%; background: #1a1a1a; color: #eee; }}
  canvas {{ display: block; margin: 0 auto; background: #000; }}
</style>
</head>
<body>
<canvas id="game" width="800" height="600"></canvas>
<script>
  const canvas = document.getElementById("game");
  const ctx = canvas.getContext("{context}");
  function frame() {{
    if (ctx && ctx.fillText) {{
      ctx.fillStyle = "#000";
      ctx.fillRect(0, 0, canvas.width, canvas.height);
      ctx.fillStyle = "#ff0";
      ctx.font = "32px sans-serif";
      ctx.fillText("{title}", 40, 80);
    }}
    requestAnimationFrame(frame);
  }}
  requestAnimationFrame(frame);
</script>
</body>
</html>
"##
    )
}

pub fn escape_html(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_page_carries_title() {
        let html = starter_html("Maze <3", GameType::TwoD);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Maze &lt;3</title>"));
        assert!(html.contains("getContext(\"2d\")"));
    }

    #[test]
    fn starter_page_keeps_css_colours() {
        let html = starter_html("Pong", GameType::ThreeD);
        assert!(html.contains("background: #000;"));
        assert!(html.contains("ctx.fillStyle = \"#ff0\";"));
        assert!(html.contains("getContext(\"webgl\")"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
