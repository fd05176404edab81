//! HTML pages of the provisioning portal

use core::fmt::Write as _;

use heapless::String;

use crate::config::PAGE_REFRESH_SECS;
use crate::domain::entity::NetworkConfig;

pub const FORM_PAGE_SIZE: usize = 4096;
pub const NOTICE_PAGE_SIZE: usize = 512;

const FORM_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>SmartHome setup</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
body { font-family: Arial; margin: 20px; }
.container { max-width: 500px; margin: 0 auto; }
.form-group { margin-bottom: 15px; }
label { display: block; margin-bottom: 5px; }
input { width: 100%; padding: 8px; box-sizing: border-box; }
button { background: #4CAF50; color: white; padding: 10px 15px; border: none; width: 100%; }
.reset-btn { background: #f44336; margin-top: 20px; }
.form-section { background: #f9f9f9; padding: 15px; border-radius: 5px; margin-bottom: 20px; }
</style>
</head>
<body>
<div class="container">
<h1>SmartHome setup</h1>
<div class="form-section">
<form action="/save" method="post">
"#;

const FORM_TAIL: &str = r#"<button type="submit">Save</button>
</form>
</div>
<div class="form-section">
<p>Erase every setting and restart the device.</p>
<form action="/reset" method="post" onsubmit="return confirm('Erase all settings?');">
<button type="submit" class="reset-btn">Reset configuration</button>
</form>
</div>
</div>
</body>
</html>
"#;

/// Render the configuration form with the current values filled in.
///
/// Values are inserted as is, without HTML escaping.
pub fn render_form(config: &NetworkConfig) -> String<FORM_PAGE_SIZE> {
    let mut html = String::new();
    let _ = html.push_str(FORM_HEAD);
    let _ = write_input(&mut html, "ssid", "WiFi SSID", "text", " required", &config.wifi_ssid);
    let _ = write_input(&mut html, "pass", "WiFi password", "password", "", &config.wifi_password);
    let _ = write_input(&mut html, "mqtt", "MQTT server", "text", "", &config.mqtt_server);
    let mut port = String::<12>::new();
    let _ = write!(port, "{}", config.mqtt_port);
    let _ = write_input(&mut html, "port", "MQTT port", "number", "", &port);
    let _ = write_input(&mut html, "muser", "MQTT user", "text", "", &config.mqtt_user);
    let _ = write_input(&mut html, "mpass", "MQTT password", "password", "", &config.mqtt_password);
    let _ = html.push_str(FORM_TAIL);
    html
}

fn write_input(
    html: &mut String<FORM_PAGE_SIZE>,
    name: &str,
    label: &str,
    kind: &str,
    extra: &str,
    value: &str,
) -> core::fmt::Result {
    write!(
        html,
        "<div class=\"form-group\">\n<label for=\"{name}\">{label}:</label>\n\
         <input type=\"{kind}\" id=\"{name}\" name=\"{name}\"{extra} value=\"{value}\">\n</div>\n"
    )
}

/// Confirmation page that sends the browser back to `/` after a while
pub fn render_notice(title: &str) -> String<NOTICE_PAGE_SIZE> {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset='UTF-8'>\
         <meta http-equiv='refresh' content='{PAGE_REFRESH_SECS};url=/'></head><body>\
         <h1>{title}</h1><p>Restarting in {PAGE_REFRESH_SECS} seconds...</p></body></html>"
    );
    html
}
