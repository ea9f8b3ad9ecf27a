pub const PAGE_TITLE: &str = "SQL Query Assistant with Google Gemini";

pub fn index_html() -> String {
    INDEX_TEMPLATE.replace("{title}", PAGE_TITLE)
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #1f2328; }
  h1 { font-size: 1.6rem; }
  .banner { padding: .6rem .8rem; border-radius: 6px; margin: 1rem 0; }
  .banner.ok { background: #dafbe1; }
  .banner.warn { background: #fff8c5; }
  .banner.err { background: #ffebe9; }
  textarea { width: 100%; min-height: 5rem; font: inherit; }
  button { margin-top: .5rem; padding: .4rem 1.2rem; font: inherit; }
  pre { background: #f6f8fa; padding: .8rem; overflow-x: auto; white-space: pre-wrap; }
  #answer { white-space: pre-wrap; }
  details { margin: .5rem 0; }
  summary { cursor: pointer; font-weight: 600; }
</style>
</head>
<body>
<h1>{title}</h1>
<div id="status" class="banner warn">Checking agent status...</div>

<details id="schema-panel">
  <summary>View Database Schema</summary>
  <pre id="schema">Loading...</pre>
</details>

<label for="query">Enter your SQL-related question:</label>
<textarea id="query" placeholder="e.g. Which city sold the most units?"></textarea>
<button id="submit">Submit Query</button>

<div id="message"></div>
<h2>Answer</h2>
<div id="answer"></div>

<h2>Query History</h2>
<div id="history"></div>

<script>
const $ = (id) => document.getElementById(id);

function banner(kind, text) {
  const el = $('message');
  el.className = kind ? 'banner ' + kind : '';
  el.textContent = text || '';
}

async function loadStatus() {
  const res = await fetch('/api/status');
  const body = await res.json();
  const el = $('status');
  if (body.ready) {
    el.className = 'banner ok';
    el.textContent = 'SQL agent ready.';
  } else {
    el.className = 'banner err';
    el.textContent = 'Error initializing SQL agent: ' + body.error;
    $('submit').disabled = true;
  }
}

async function loadSchema() {
  const res = await fetch('/api/schema');
  $('schema').textContent = await res.text();
}

async function loadHistory() {
  const res = await fetch('/api/history');
  const entries = await res.json();
  const root = $('history');
  root.innerHTML = '';
  for (const entry of entries) {
    const details = document.createElement('details');
    const summary = document.createElement('summary');
    summary.textContent = 'Query ' + entry.number + ': ' + entry.title;
    const q = document.createElement('p');
    q.textContent = 'Query: ' + entry.query;
    const a = document.createElement('p');
    a.textContent = 'Response: ' + entry.response;
    details.append(summary, q, a);
    root.append(details);
  }
}

$('submit').addEventListener('click', async () => {
  const query = $('query').value;
  banner('', '');
  $('submit').disabled = true;
  $('answer').textContent = 'Processing your query...';
  try {
    const res = await fetch('/api/query', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ query }),
    });
    if (res.ok) {
      const body = await res.json();
      $('answer').textContent = body.answer;
      await loadHistory();
    } else {
      $('answer').textContent = '';
      banner(res.status === 400 ? 'warn' : 'err', await res.text());
    }
  } finally {
    $('submit').disabled = false;
  }
});

loadStatus().then(loadSchema).then(loadHistory);
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_has_title_and_panels() {
        let html = index_html();
        assert!(html.contains("<title>SQL Query Assistant with Google Gemini</title>"));
        assert!(html.contains("View Database Schema"));
        assert!(!html.contains("{title}"));
    }
}
