use crate::{
    config::ClientConfig,
    error::{Result, StudioError},
    types::ApiErrorBody,
};
use reqwest::blocking::{Client, Response};
use std::{
    fs,
    fs::File,
    io::{Read, Write},
    path::Path,
};

pub fn http_client(cfg: &ClientConfig) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(cfg.connect_timeout)
        .timeout(cfg.request_timeout)
        .build()?)
}

/// Turn a non-2xx response into `StudioError::Http`, keeping the status code
/// so callers can tell a 404 from a 500.
pub fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(StudioError::Http {
            status: status.as_u16(),
            url: resp.url().to_string(),
        })
    }
}

/// Human-readable reason from a failed response: the API's `detail` field
/// when present, otherwise the status line.
pub fn error_detail(resp: Response) -> String {
    let status = resp.status();
    resp.json::<ApiErrorBody>()
        .map(|body| body.message())
        .unwrap_or_else(|_| format!("server answered HTTP {}", status.as_u16()))
}

pub fn download_with_progress(
    client: &Client,
    url: &str,
    dest: &Path,
    on_progress: &mut dyn FnMut(u64, u64),
) -> Result<u64> {
    let tmp = dest.with_extension("part");

    let mut resp = check_status(client.get(url).send()?)?;

    let total = resp.content_length().unwrap_or(0);

    on_progress(0, total);

    let mut file = File::create(&tmp)?;
    let mut downloaded: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = resp.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        downloaded += n as u64;
        on_progress(downloaded, total);
    }
    file.flush()?;

    if dest.exists() {
        fs::remove_file(dest).ok();
    }

    fs::rename(&tmp, dest)?;

    on_progress(total.max(downloaded), total.max(downloaded));

    Ok(downloaded)
}
