//! Sample pages and sitemaps

pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Acme Home</title>
<meta name="description" content="Tools for builders">
</head>
<body>
<h1>Welcome to Acme</h1>
<p>Hello <b>world</b></p>
<nav>
<a href="/about.html">About us</a>
<a href="/login">Sign in</a>
<a href="https://github.com/acme">Source</a>
<a href="#top">Back to top</a>
</nav>
<script>var greeting = "do not translate";</script>
</body>
</html>
"##;

pub const ABOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<title>About Acme</title>
</head>
<body>
<p>We build tools.</p>
<a href="index.html">Home</a>
</body>
</html>
"#;

pub const NESTED_PAGE: &str = "<html><head></head><body><p>Hello <b>world</b></p></body></html>";

pub const SITEMAP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/</loc>
  </url>
  <url>
    <loc>https://example.com/about.html</loc>
  </url>
</urlset>
"#;
