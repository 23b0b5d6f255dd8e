use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::auth::repo_types::User;

fn layout(title: &str, signed_in: bool, body: &str) -> String {
    let account = if signed_in {
        r#"<a href="/dashboard">Dashboard</a> <a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/login">Log in</a> <a href="/signup">Sign up</a>"#
    };
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} | CarePoint</title></head>
<body>
<nav><a href="/">Home</a> <a href="/services">Services</a> <a href="/doctors">Doctors</a> {account}</nav>
<main>
{body}
</main>
</body>
</html>"#,
        title = encode_text(title),
    )
}

fn flash_block(flash: Option<&str>) -> String {
    flash
        .map(|m| format!(r#"<p class="flash">{}</p>"#, encode_text(m)))
        .unwrap_or_default()
}

pub fn static_page(title: &str, text: &str, signed_in: bool) -> String {
    layout(
        title,
        signed_in,
        &format!("<h1>{}</h1><p>{}</p>", encode_text(title), encode_text(text)),
    )
}

pub fn login(flash: Option<&str>) -> String {
    layout(
        "Log in",
        false,
        &format!(
            r#"<h1>Log in</h1>
{}
<form method="post" action="/login">
  <label>Email <input type="email" name="email" required></label>
  <label>Password <input type="password" name="password" required></label>
  <button type="submit">Log in</button>
</form>
<p><a href="/auth/google">Continue with Google</a></p>
<p>No account yet? <a href="/signup">Sign up</a></p>"#,
            flash_block(flash)
        ),
    )
}

pub fn signup(flash: Option<&str>) -> String {
    layout(
        "Sign up",
        false,
        &format!(
            r#"<h1>Create an account</h1>
{}
<form method="post" action="/signup">
  <label>First name <input name="first_name" required></label>
  <label>Last name <input name="last_name" required></label>
  <label>Email <input type="email" name="email" required></label>
  <label>Password <input type="password" name="password" minlength="8" required></label>
  <button type="submit">Sign up</button>
</form>
<p><a href="/auth/google">Sign up with Google</a></p>"#,
            flash_block(flash)
        ),
    )
}

pub fn member_page(title: &str, user: &User) -> String {
    let picture = user
        .profile_picture_url
        .as_deref()
        .map(|url| {
            format!(
                r#"<img src="{}" alt="" width="48" height="48">"#,
                encode_double_quoted_attribute(url)
            )
        })
        .unwrap_or_default();
    layout(
        title,
        true,
        &format!(
            "<h1>{}</h1>{}<p>Signed in as {} ({})</p>",
            encode_text(title),
            picture,
            encode_text(&user.display_name()),
            encode_text(&user.email),
        ),
    )
}
