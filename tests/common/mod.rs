#![allow(dead_code)]

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use cdn_service::{build_router, build_state, domain::config::server::ServerConfig};
use image::{
    codecs::gif::{GifEncoder, Repeat},
    Delay, DynamicImage, Frame, ImageFormat, Rgba, RgbaImage,
};
use serde_json::Value;
use tempfile::TempDir;

pub const SECRET: &str = "test-secret";
pub const WORKER_ID: &str = "test-worker";
const BOUNDARY: &str = "----cdn-test-boundary";

pub struct TestApp {
    pub router: Router,
    root: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_upload_limit(64 * 1024 * 1024).await
    }

    pub async fn spawn_with_upload_limit(max_upload_bytes: u64) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            secret: SECRET.to_string(),
            port: 0,
            public_dir: root.path().join("public"),
            temp_dir: root.path().join("temp"),
            cors_allowed_origins: None,
            worker_id: WORKER_ID.to_string(),
            flake_machine_id: 1,
            max_upload_bytes,
            max_remote_bytes: 1024 * 1024,
        };
        let state = build_state(config).await.unwrap();
        Self {
            router: build_router(state),
            root,
        }
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.path().join("public")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.path().join("temp")
    }

    pub fn public_file(&self, relative: &str) -> PathBuf {
        let decoded = percent_encoding::percent_decode_str(relative)
            .decode_utf8()
            .unwrap()
            .into_owned();
        self.public_dir().join(decoded)
    }

    /// Scratch files and staging directories left behind by requests.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.temp_dir()).unwrap().count()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn upload(&self, uri: &str, form: MultipartForm) -> (u16, Value) {
        let response = self.send(form.into_request(uri)).await;
        let status = response.status().as_u16();
        (status, json_body(response).await)
    }

    pub async fn delete_json(&self, uri: &str, body: Value) -> (u16, Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.send(request).await;
        let status = response.status().as_u16();
        (status, json_body(response).await)
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn raw_body(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
    truncate_at: Option<usize>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Cuts the body off mid-file, the way a client that goes away would.
    pub fn truncated(mut self) -> Self {
        self.truncate_at = Some(self.body.len().saturating_sub(64));
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        match self.truncate_at {
            Some(at) => self.body.truncate(at),
            None => self
                .body
                .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes()),
        }
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(gradient(width, height)), ImageFormat::Png)
}

/// Flat colour keeps large fixtures small.
pub fn flat_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([30, 120, 200, 255]));
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let rgb = DynamicImage::ImageRgba8(gradient(width, height)).to_rgb8();
    encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Jpeg)
}

pub fn gif(frames: u32, width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for i in 0..frames {
            let shade = (i * 70 % 256) as u8;
            let image = RgbaImage::from_pixel(width, height, Rgba([shade, 40, 255 - shade, 255]));
            encoder
                .encode_frame(Frame::from_parts(
                    image,
                    0,
                    0,
                    Delay::from_numer_denom_ms(80, 1),
                ))
                .unwrap();
        }
    }
    buffer
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
