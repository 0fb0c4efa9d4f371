//! Viewer page served at `/`.

/// Render the control page: the site in an iframe, start/stop buttons and a
/// live log fed by `/events`.
pub fn render_viewer(direct_link: &str) -> String {
    VIEWER_TEMPLATE.replace("{{DIRECT_LINK}}", &escape_attr(direct_link))
}

/// Escape a value for use inside a double-quoted HTML attribute.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

const VIEWER_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>botdesk robot</title>
<style>
  body { margin: 0; font-family: system-ui, sans-serif; display: flex; height: 100vh; }
  #site { flex: 2; border: 0; border-right: 1px solid #ccc; }
  #side { flex: 1; display: flex; flex-direction: column; padding: 12px; gap: 8px; }
  #log { flex: 1; overflow-y: auto; font: 13px monospace; background: #111; color: #ddd; padding: 8px; }
  .info { color: #ddd; } .success { color: #6c6; } .error { color: #e66; }
</style>
</head>
<body>
<iframe id="site" src="{{DIRECT_LINK}}"></iframe>
<div id="side">
  <div>
    <button id="start">Start</button>
    <button id="stop">Stop</button>
    <span id="state"></span>
  </div>
  <div id="log"></div>
</div>
<script>
  const log = document.getElementById('log');
  const site = document.getElementById('site');
  const state = document.getElementById('state');
  function line(level, msg) {
    const div = document.createElement('div');
    div.className = level;
    div.textContent = new Date().toLocaleTimeString() + '  ' + msg;
    log.appendChild(div);
    log.scrollTop = log.scrollHeight;
  }
  const events = new EventSource('/events');
  events.onmessage = (e) => {
    const ev = JSON.parse(e.data);
    line(ev.level, ev.msg);
    if (ev.url) site.src = ev.url;
  };
  events.onerror = () => line('error', 'event stream disconnected, retrying...');
  async function post(path) {
    const res = await fetch(path, { method: 'POST' });
    const body = await res.json().catch(() => ({}));
    if (!res.ok) line('error', body.error || res.statusText);
  }
  async function refresh() {
    const res = await fetch('/status');
    if (res.ok) {
      const s = await res.json();
      state.textContent = s.running ? 'running (' + s.phase + ')' : s.phase;
    }
  }
  document.getElementById('start').onclick = () => post('/start').then(refresh);
  document.getElementById('stop').onclick = () => post('/stop').then(refresh);
  setInterval(refresh, 2000);
  refresh();
</script>
</body>
</html>
"#;
