//! Code generation for the kernel-proxy request path.
//!
//! The generated snippet performs a non-streaming chat-completions request
//! from inside the kernel and reports the result on stdout between the
//! sentinels in [`crate::capture`].

use crate::capture::{RESPONSE_END, RESPONSE_ERROR, RESPONSE_START};
use crate::request::ChatRequest;
use crate::runtime::Runtime;

/// Timeout applied by the generated HTTP call, in seconds.
pub const KERNEL_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the source to execute in a kernel of the given runtime.
///
/// The URL and JSON body are embedded as JSON string literals, which are
/// valid string literals in both Python and TypeScript.
pub fn kernel_snippet(
    runtime: Runtime,
    url: &str,
    request: &ChatRequest,
) -> Result<String, serde_json::Error> {
    let url = serde_json::to_string(url)?;
    let body = serde_json::to_string(&serde_json::to_string(request)?)?;

    Ok(match runtime {
        Runtime::Python => python_snippet(&url, &body),
        Runtime::Deno => deno_snippet(&url, &body),
    })
}

fn python_snippet(url: &str, body: &str) -> String {
    format!(
        r#"def _llm_client_request():
    import json
    import urllib.request

    try:
        request = urllib.request.Request(
            {url},
            data={body}.encode("utf-8"),
            headers={{"Content-Type": "application/json"}},
            method="POST",
        )
        with urllib.request.urlopen(request, timeout={timeout}) as response:
            data = json.loads(response.read().decode("utf-8"))
        content = data["choices"][0]["message"]["content"]
        print("{start}")
        print(content)
        print("{end}")
    except Exception as e:
        print("{error} " + str(e))


_llm_client_request()
del _llm_client_request
"#,
        url = url,
        body = body,
        timeout = KERNEL_REQUEST_TIMEOUT_SECS,
        start = RESPONSE_START,
        end = RESPONSE_END,
        error = RESPONSE_ERROR,
    )
}

fn deno_snippet(url: &str, body: &str) -> String {
    format!(
        r#"await (async () => {{
  try {{
    const response = await fetch({url}, {{
      method: "POST",
      headers: {{ "Content-Type": "application/json" }},
      body: {body},
      signal: AbortSignal.timeout({timeout_ms}),
    }});
    if (!response.ok) {{
      throw new Error(`HTTP ${{response.status}}: ${{response.statusText}}`);
    }}
    const data = await response.json();
    console.log("{start}");
    console.log(data.choices[0].message.content);
    console.log("{end}");
  }} catch (e) {{
    console.log("{error} " + (e instanceof Error ? e.message : String(e)));
  }}
}})();
"#,
        url = url,
        body = body,
        timeout_ms = KERNEL_REQUEST_TIMEOUT_SECS * 1000,
        start = RESPONSE_START,
        end = RESPONSE_END,
        error = RESPONSE_ERROR,
    )
}
