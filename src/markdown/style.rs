//! Print stylesheet for Markdown documents.

/// A4 pages, 2 cm margins, GitHub-like typography.
///
/// Code blocks arrive pre-coloured with inline styles; `.codehilite` only
/// provides the box around them.
pub const DEFAULT_STYLESHEET: &str = r#"
@page {
    size: A4;
    margin: 2cm;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", "PingFang SC", "Hiragino Sans GB", "Microsoft YaHei", "Helvetica Neue", Helvetica, Arial, sans-serif;
    font-size: 11pt;
    line-height: 1.6;
    color: #333;
    max-width: 100%;
    -webkit-print-color-adjust: exact;
    print-color-adjust: exact;
}

h1, h2, h3, h4, h5, h6 {
    font-weight: 600;
    margin-top: 1.5em;
    margin-bottom: 0.5em;
    color: #000;
    page-break-after: avoid;
}

h1 { font-size: 24pt; border-bottom: 2px solid #eee; padding-bottom: 0.3em; }
h2 { font-size: 20pt; border-bottom: 1px solid #eee; padding-bottom: 0.3em; }
h3 { font-size: 16pt; }
h4 { font-size: 14pt; }
h5 { font-size: 12pt; }
h6 { font-size: 11pt; }

p { margin: 0.8em 0; }

a { color: #0366d6; text-decoration: none; }

code {
    font-family: "SF Mono", Monaco, Menlo, Consolas, "Courier New", monospace;
    font-size: 9.5pt;
    background-color: #f6f8fa;
    padding: 0.2em 0.4em;
    border-radius: 3px;
}

pre {
    background-color: #f6f8fa;
    padding: 1em;
    border-radius: 5px;
    overflow-x: auto;
    white-space: pre-wrap;
    page-break-inside: avoid;
    margin: 1em 0;
}

pre code { background-color: transparent; padding: 0; font-size: 9pt; }

blockquote {
    margin: 1em 0;
    padding-left: 1em;
    border-left: 4px solid #ddd;
    color: #666;
}

ul, ol { margin: 0.8em 0; padding-left: 2em; }
li { margin: 0.3em 0; }
li input[type="checkbox"] { margin-right: 0.4em; }

table {
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
    page-break-inside: avoid;
}

th, td { border: 1px solid #ddd; padding: 0.5em 0.8em; text-align: left; }
th { background-color: #f6f8fa; font-weight: 600; }
tr:nth-child(even) { background-color: #f9f9f9; }

img { max-width: 100%; height: auto; display: block; margin: 1em 0; }

hr { border: none; border-top: 1px solid #eee; margin: 2em 0; }

.codehilite {
    background-color: #f6f8fa;
    border-radius: 5px;
    margin: 1em 0;
    page-break-inside: avoid;
}

.codehilite pre {
    margin: 0;
    font-family: "SF Mono", Monaco, Menlo, Consolas, "Courier New", monospace;
    font-size: 9pt;
}

.toc ul { list-style: none; padding-left: 1.2em; }
.toc > ul { padding-left: 0; }

.footnote-definition { font-size: 9pt; color: #555; margin: 0.4em 0; }
.footnote-definition p { display: inline; }
"#;
