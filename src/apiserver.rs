// apiserver.rs

use askama::Template;
use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{Response, StatusCode, header},
    response::{Html, IntoResponse},
    routing::*,
};

use crate::*;

#[derive(Template)]
#[template(path = "index.html.ask", escape = "html")]
pub struct IndexPage {
    pub ssid: String,
    pub passwd: String,
    pub sens1: String,
    pub sens2: String,
    pub status: String,
    pub readings: String,
    pub version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkParams {
    pub ssid: Option<String>,
    pub passwd: Option<String>,
    pub save: Option<String>,
    pub connect: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalibParams {
    pub sens1: Option<String>,
    pub sens2: Option<String>,
}

pub async fn run_api_server(state: Arc<Pin<Box<MyState>>>) -> anyhow::Result<()> {
    let listen = format!("0.0.0.0:{}", state.config.port);
    let addr = listen.parse::<net::SocketAddr>()?;

    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening to {listen}");
    Ok(axum::serve(listener, app.into_make_service()).await?)
}

pub fn api_router(state: Arc<Pin<Box<MyState>>>) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/network", get(get_network))
        .route("/savecalib", get(get_savecalib))
        .route("/gettemp", get(get_gettemp))
        .route("/temp", get(get_temp))
        .route("/status", get(get_status))
        .fallback(not_found)
        .with_state(state)
}

fn redirect_home() -> Response<Body> {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

fn is_set(flag: &Option<String>) -> bool {
    flag.as_deref() == Some("1")
}

pub async fn get_index(State(state): State<Arc<Pin<Box<MyState>>>>) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_index()");

    let page = {
        let store = state.store.read().await;
        let readings = *state.readings.read().await;
        let net = *state.net.read().await;
        IndexPage {
            ssid: store.get_or_empty(KEY_NETWORK_NAME),
            passwd: store.get_or_empty(KEY_NETWORK_PASSPHRASE),
            sens1: store.get_or_empty(KEY_CHANNEL_OFFSET[0]),
            sens2: store.get_or_empty(KEY_CHANNEL_OFFSET[1]),
            status: match net.address() {
                Some(a) => format!("{net} ({a})"),
                None => net.to_string(),
            },
            readings: format!("{} {}", readings[0], readings[1]),
            version: FW_VERSION,
        }
    };

    match page.render() {
        Ok(s) => (StatusCode::OK, Html(s)).into_response(),
        Err(e) => {
            let err_msg = format!("Index template error: {e:?}\n");
            error!("{err_msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, err_msg).into_response()
        }
    }
}

pub async fn get_network(
    State(state): State<Arc<Pin<Box<MyState>>>>,
    Query(params): Query<NetworkParams>,
) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_network()");

    if is_set(&params.save) {
        let mut store = state.store.write().await;
        if let Some(ssid) = &params.ssid {
            info!("Received ssid: {ssid:?}");
            if let Err(e) = store.set(KEY_NETWORK_NAME, ssid) {
                return store_error(e);
            }
        }
        if let Some(passwd) = &params.passwd {
            info!("Received passwd");
            if let Err(e) = store.set(KEY_NETWORK_PASSPHRASE, passwd) {
                return store_error(e);
            }
        }
    }

    if is_set(&params.connect) {
        state.request(Request::Reconnect);
    }

    redirect_home()
}

pub async fn get_savecalib(
    State(state): State<Arc<Pin<Box<MyState>>>>,
    Query(params): Query<CalibParams>,
) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_savecalib()");

    {
        let mut store = state.store.write().await;
        for (ch, value) in [&params.sens1, &params.sens2].into_iter().enumerate() {
            if let Some(value) = value {
                info!("Received sensor {}: {value:?}", ch + 1);
                if let Err(e) = store.set(KEY_CHANNEL_OFFSET[ch], value) {
                    return store_error(e);
                }
            }
        }
    }
    state.request(Request::ReloadCalibration);

    redirect_home()
}

fn store_error(e: anyhow::Error) -> Response<Body> {
    let msg = format!("Store write error: {e:#}");
    error!("{msg}");
    (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
}

pub async fn get_gettemp(State(state): State<Arc<Pin<Box<MyState>>>>) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_gettemp()");

    let readings = *state.readings.read().await;
    let temps = format!("{} {}", readings[0], readings[1]);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        temps,
    )
        .into_response()
}

pub async fn get_temp(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, Json<TempValues>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_temp()");

    (StatusCode::OK, Json(state.temp_values().await))
}

pub async fn get_status(
    State(state): State<Arc<Pin<Box<MyState>>>>,
) -> (StatusCode, Json<DeviceStatus>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_status()");

    (StatusCode::OK, Json(state.status().await))
}

pub async fn not_found(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, &'static str) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} not_found()");

    (StatusCode::NOT_FOUND, "Not found")
}


// EOF
