use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Caption Studio</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0b1120;
            color: #e2e8f0;
            min-height: 100vh;
            padding: 32px 16px;
        }

        header { text-align: center; margin-bottom: 32px; }
        header h1 { font-size: 2.4em; color: #a5b4fc; margin-bottom: 8px; }
        header p { color: #94a3b8; }

        main {
            max-width: 1100px;
            margin: 0 auto;
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(320px, 1fr));
            gap: 24px;
        }

        .panel {
            background: #111827;
            border: 1px solid #1f2937;
            border-radius: 16px;
            padding: 24px;
            display: flex;
            flex-direction: column;
            gap: 20px;
        }

        label { font-size: 0.9em; color: #cbd5e1; }

        textarea {
            width: 100%;
            margin-top: 8px;
            background: #1e293b;
            color: #e2e8f0;
            border: 1px solid #334155;
            border-radius: 10px;
            padding: 12px;
            font: inherit;
            resize: vertical;
        }

        .drop {
            flex: 1;
            min-height: 260px;
            border: 2px dashed #334155;
            border-radius: 12px;
            display: flex;
            align-items: center;
            justify-content: center;
            text-align: center;
            cursor: pointer;
            color: #94a3b8;
        }
        .drop:hover { border-color: #818cf8; }
        .drop img { max-height: 320px; max-width: 100%; border-radius: 10px; }

        input[type="file"] { display: none; }

        button {
            background: #6366f1;
            color: white;
            border: none;
            border-radius: 10px;
            padding: 14px;
            font-weight: 700;
            font-size: 1em;
            cursor: pointer;
        }
        button:disabled { background: #475569; cursor: not-allowed; }

        .result {
            flex: 1;
            min-height: 200px;
            background: #1e293b;
            border-radius: 10px;
            padding: 16px;
            display: flex;
            align-items: center;
            justify-content: center;
            white-space: pre-wrap;
        }
        .result.error { color: #f87171; }
        .result.empty { color: #64748b; }

        footer { text-align: center; color: #64748b; margin-top: 32px; font-size: 0.85em; }
    </style>
</head>
<body>
    <header>
        <h1>Caption Studio</h1>
        <p>Upload an image, tell the model what you want, get a caption.</p>
    </header>

    <main>
        <section class="panel">
            <div>
                <label for="prompt">Your prompt</label>
                <textarea id="prompt" rows="3" placeholder="e.g. Describe this image for a children's book"></textarea>
            </div>
            <div class="drop" id="drop">
                <span id="dropHint">Click to upload an image<br><small>PNG, JPG, or WEBP (max 4MB)</small></span>
                <img id="preview" alt="Selected preview" hidden>
            </div>
            <input type="file" id="file" accept="image/png, image/jpeg, image/webp">
        </section>

        <section class="panel">
            <button id="generate" disabled>Generate Caption</button>
            <div class="result empty" id="result">Your generated caption will appear here.</div>
        </section>
    </main>

    <footer>Powered by Google Gemini</footer>

    <script>
        const promptEl = document.getElementById('prompt');
        const drop = document.getElementById('drop');
        const dropHint = document.getElementById('dropHint');
        const fileInput = document.getElementById('file');
        const preview = document.getElementById('preview');
        const generateBtn = document.getElementById('generate');
        const result = document.getElementById('result');

        function render(view) {
            if (document.activeElement !== promptEl) {
                promptEl.value = view.prompt;
            }

            if (view.preview_url) {
                preview.src = view.preview_url;
                preview.hidden = false;
                dropHint.hidden = true;
            } else {
                preview.removeAttribute('src');
                preview.hidden = true;
                dropHint.hidden = false;
            }

            const loading = view.phase === 'loading';
            generateBtn.disabled = !view.can_generate;
            generateBtn.textContent = loading ? 'Generating...' : 'Generate Caption';

            result.className = 'result';
            if (loading) {
                result.textContent = 'AI is analyzing the image...';
            } else if (view.error) {
                result.classList.add('error');
                result.textContent = view.error;
            } else if (view.caption) {
                result.textContent = view.caption;
            } else {
                result.classList.add('empty');
                result.textContent = 'Your generated caption will appear here.';
            }
        }

        function showError(message) {
            result.className = 'result error';
            result.textContent = message;
        }

        async function call(method, url, body, headers) {
            const response = await fetch(url, { method, body, headers });
            const data = await response.json().catch(() => null);
            // 409 still carries a session view; other failures carry { kind, error }.
            if (data && 'phase' in data) {
                render(data);
            } else {
                showError((data && data.error) || `Request failed (${response.status}).`);
                fetch('/api/session').then(r => r.json()).then(view => {
                    if (!view.error) view.error = (data && data.error) || '';
                    render(view);
                });
            }
        }

        drop.addEventListener('click', () => fileInput.click());

        fileInput.addEventListener('change', () => {
            const file = fileInput.files[0];
            if (!file) return;
            const form = new FormData();
            form.append('image', file);
            fileInput.value = '';
            call('POST', '/api/session/asset', form);
        });

        let promptTimer;
        promptEl.addEventListener('input', () => {
            clearTimeout(promptTimer);
            promptTimer = setTimeout(() => {
                call('PUT', '/api/session/prompt',
                    JSON.stringify({ prompt: promptEl.value }),
                    { 'Content-Type': 'application/json' });
            }, 250);
        });

        generateBtn.addEventListener('click', async () => {
            clearTimeout(promptTimer);
            generateBtn.disabled = true;
            generateBtn.textContent = 'Generating...';
            result.className = 'result';
            result.textContent = 'AI is analyzing the image...';
            await fetch('/api/session/prompt', {
                method: 'PUT',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ prompt: promptEl.value }),
            });
            call('POST', '/api/session/generate');
        });

        fetch('/api/session').then(r => r.json()).then(render);
    </script>
</body>
</html>
"#;
