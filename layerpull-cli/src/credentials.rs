use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decode a base64-encoded credential value (surrounding whitespace ignored).
pub fn decode(name: &str, encoded: &str) -> anyhow::Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .with_context(|| format!("{} is not valid base64", name))?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", name))
}

/// Decode both sides of a credential pair when `base64` is set.
pub fn resolve(
    access_key: Option<String>,
    secret_key: Option<String>,
    base64: bool,
) -> anyhow::Result<(Option<String>, Option<String>)> {
    if !base64 {
        return Ok((access_key, secret_key));
    }
    let access_key = access_key
        .map(|v| decode("access key", &v))
        .transpose()?;
    let secret_key = secret_key
        .map(|v| decode("secret key", &v))
        .transpose()?;
    Ok((access_key, secret_key))
}
