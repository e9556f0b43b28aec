// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTML templates for the gallery

use minijinja::Environment;

pub const BASE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}Visual Supports{% endblock %}</title>
    <style>
        :root {
            --bg-primary: #f7f7fb;
            --bg-card: #ffffff;
            --text-primary: #1d1d29;
            --text-secondary: #6b6b80;
            --accent: #3b5bdb;
            --danger: #e03131;
            --border: #dcdce6;
        }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.5;
        }
        .container { max-width: 1280px; margin: 0 auto; padding: 24px; }
        header { text-align: center; margin-bottom: 24px; }
        header p { color: var(--text-secondary); }
        .card {
            background: var(--bg-card);
            border: 1px solid var(--border);
            border-radius: 10px;
            padding: 24px;
        }
        .lock { max-width: 420px; margin: 15vh auto 0; text-align: center; }
        .lock input {
            width: 100%; padding: 12px; font-size: 1.1em; text-align: center;
            letter-spacing: 0.1em; border: 1px solid var(--border); border-radius: 8px;
        }
        .lock input.invalid { border-color: var(--danger); }
        .error { color: var(--danger); margin-top: 8px; font-size: 0.9em; }
        button.primary {
            width: 100%; margin-top: 16px; padding: 12px; border: 0; border-radius: 8px;
            background: var(--accent); color: white; font-size: 1em; cursor: pointer;
        }
        .grid { display: grid; gap: 16px; grid-auto-rows: 1fr; }
        .grid-cols-1 { grid-template-columns: repeat(1, minmax(0, 1fr)); }
        .grid-cols-2 { grid-template-columns: repeat(2, minmax(0, 1fr)); }
        .grid-cols-3 { grid-template-columns: repeat(3, minmax(0, 1fr)); }
        .grid-cols-4 { grid-template-columns: repeat(4, minmax(0, 1fr)); }
        .grid-cols-5 { grid-template-columns: repeat(5, minmax(0, 1fr)); }
        .tile { position: relative; background: var(--bg-card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
        .tile button.open { display: block; width: 100%; border: 0; background: none; cursor: pointer; text-align: left; }
        .tile .media { aspect-ratio: 1 / 1; overflow: hidden; }
        .tile img { width: 100%; height: 100%; object-fit: cover; }
        .tile .pdf { height: 100%; display: flex; align-items: center; justify-content: center; background: #fff0f0; color: var(--danger); font-weight: 600; }
        .tile h3 { padding: 10px 12px; font-size: 0.95em; font-weight: 500; }
        .tile form.delete { position: absolute; top: 6px; right: 6px; }
        .tile form.delete button { border: 0; border-radius: 50%; width: 28px; height: 28px; background: rgba(0,0,0,0.55); color: white; cursor: pointer; }
        .empty { min-height: 360px; display: flex; flex-direction: column; align-items: center; justify-content: center; border: 2px dashed var(--border); border-radius: 10px; }
        .dropzone.over { border-color: var(--accent); background: #eef2ff; }
        .status { position: fixed; bottom: 24px; left: 24px; background: var(--accent); color: white; padding: 8px 16px; border-radius: 8px; }
        .banner { margin-bottom: 16px; padding: 12px 16px; border-radius: 8px; background: #fff0f0; color: var(--danger); }
        .toolbar { display: flex; justify-content: flex-end; gap: 8px; margin-bottom: 16px; }
        .overlay { position: fixed; inset: 0; z-index: 50; display: flex; align-items: center; justify-content: center; }
        .overlay form.backdrop { position: absolute; inset: 0; }
        .overlay form.backdrop button { width: 100%; height: 100%; border: 0; background: rgba(0,0,0,0.9); cursor: pointer; }
        .overlay .stage { position: relative; max-width: 100%; max-height: 100%; padding: 16px; }
        .overlay .stage img { max-width: 95vw; max-height: 85vh; object-fit: contain; }
        .overlay .placeholder { background: white; padding: 32px; border-radius: 10px; text-align: center; }
        .overlay .caption { margin-top: 12px; text-align: center; color: white; font-size: 1.1em; }
    </style>
</head>
<body>
    <main class="container">
        {% block content %}{% endblock %}
    </main>
</body>
</html>"#;

pub const LOCK: &str = r#"{% extends "base.html" %}
{% block title %}Locked - Visual Supports{% endblock %}
{% block content %}
<div class="card lock">
    <h1>Visual Supports</h1>
    <p>Enter password to access</p>
    <form method="post" action="/unlock">
        <input type="password" name="secret" placeholder="Enter password" autofocus
               class="{% if error %}invalid{% endif %}">
        {% if error %}<p class="error">{{ error }}</p>{% endif %}
        <button type="submit" class="primary">Unlock</button>
    </form>
</div>
{% endblock %}"#;

pub const GALLERY: &str = r#"{% extends "base.html" %}
{% block content %}
<header>
    <h1>Visual Supports</h1>
    <p>Upload and organize your visual documents</p>
</header>

{% if error %}<div class="banner">{{ error }}</div>{% endif %}

<div class="toolbar">
    <form method="post" action="/refresh"><button type="submit">Refresh</button></form>
    <form method="post" action="/lock"><button type="submit">Lock</button></form>
</div>

<form id="upload" class="dropzone {% if empty %}empty{% endif %}" method="post" action="/upload" enctype="multipart/form-data">
    {% if empty %}
    <h3>No visuals yet</h3>
    <p>Upload your first visual support to get started</p>
    {% endif %}
    <input type="file" name="files" multiple accept="image/*,.pdf" {% if loading %}disabled{% endif %}
           onchange="this.form.submit()">
</form>

{% if not empty %}
<section class="grid {{ grid_class }}" data-columns="{{ layout.columns }}" data-rows="{{ layout.rows }}">
    {% for tile in tiles %}
    <div class="tile" id="tile-{{ loop.index }}">
        <form method="post" action="/viewer/toggle">
            <input type="hidden" name="id" value="{{ tile.id }}">
            <button type="submit" class="open">
                <div class="media">
                    {% if tile.is_pdf %}
                    <div class="pdf">PDF Document</div>
                    {% else %}
                    <img src="{{ tile.href }}" alt="{{ tile.label }}">
                    {% endif %}
                </div>
                <h3>{{ tile.label }}</h3>
            </button>
        </form>
        <form method="post" action="/visuals/delete" class="delete">
            <input type="hidden" name="id" value="{{ tile.id }}">
            <button type="submit" title="Delete {{ tile.label }}">&times;</button>
        </form>
    </div>
    {% endfor %}
</section>
{% endif %}

{% if loading %}<div class="status">Uploading...</div>{% endif %}

{% if viewer %}
<div class="overlay">
    <form method="post" action="/viewer/close" class="backdrop"><button type="submit" aria-label="Close"></button></form>
    <div class="stage">
        {% if viewer.kind == "pdf_placeholder" %}
        <div class="placeholder">
            <h2>PDF Document</h2>
            <p>{{ viewer.label }}</p>
        </div>
        {% else %}
        <img src="{{ viewer.href }}" alt="{{ viewer.label }}">
        {% endif %}
        <p class="caption">{{ viewer.label }}</p>
    </div>
</div>
{% endif %}

<script>
    (function () {
        var zone = document.getElementById("upload");
        var input = zone.querySelector("input[type=file]");
        ["dragenter", "dragover"].forEach(function (name) {
            zone.addEventListener(name, function (e) { e.preventDefault(); zone.classList.add("over"); });
        });
        zone.addEventListener("dragleave", function () { zone.classList.remove("over"); });
        zone.addEventListener("drop", function (e) {
            e.preventDefault();
            zone.classList.remove("over");
            input.files = e.dataTransfer.files;
            zone.submit();
        });
    })();
</script>
{% endblock %}"#;

/// Build the template environment
pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("base.html", BASE)?;
    env.add_template("lock.html", LOCK)?;
    env.add_template("gallery.html", GALLERY)?;
    Ok(env)
}
