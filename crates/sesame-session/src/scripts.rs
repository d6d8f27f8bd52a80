//! Page-side expressions the bootstrapper evaluates or polls.

/// The web client has booted far enough to report its version.
pub const PAGE_READY: &str = "window.Debug!=undefined && window.Debug.VERSION!=undefined";
pub const CLIENT_VERSION: &str = "window.Debug ? window.Debug.VERSION : 'I think you have been TOS_BLOCKed'";
pub const USER_AGENT: &str = "navigator.userAgent";

/// Stored tokens indicate this launch is resuming an earlier session.
pub const ATTEMPTING_REAUTH: &str = "!!(localStorage['WAToken2'] || localStorage['last-wid-md'])";
pub const REAUTH_STORE_PLACEHOLDER: &str = r#"window.Store = {"Msg": true}"#;
pub const CLEAR_STORE: &str = "window.Store = undefined";

// Invariant violation avoidance probes
pub const MODULES_LOADED: &str = "(()=>{if(!window.webpackChunkwhatsapp_web_client) return false; return window.webpackChunkwhatsapp_web_client.length > 15})()";
pub const QR_CONTAINER_LOADED: &str = "[...document.getElementsByTagName('div')].filter(x=>x.dataset && x.dataset.testid)[0]?.dataset?.testid === 'qrcode'";
pub const QR_SPINNER_PRESENT: &str = "document.getElementsByTagName('circle').length===1";
pub const EARLY_INJECTION_CHECK: &str = "!!window.webpackChunkwhatsapp_web_client";

// Authentication watchers
pub const QR_REFRESH: &str = "checkQrRefresh()";
pub const QR_CANVAS: &str = "!!document.querySelector(\"canvas[aria-label='Scan me!']\")";
pub const LANDING_REACHED: &str = "!!document.querySelector('body > div > div > .landing-wrapper')";
pub const INSIDE_CHAT: &str = "!!window.WA_AUTHENTICATED || (document.getElementsByClassName('app')[0] && document.getElementsByClassName('app')[0].attributes && !!document.getElementsByClassName('app')[0].attributes.tabindex) || (document.getElementsByClassName('two')[0] && document.getElementsByClassName('two')[0].attributes && !!document.getElementsByClassName('two')[0].attributes.tabindex)";
pub const SESSION_DATA_INVALID: &str = "Object.keys(localStorage).includes(\"old-logout-cred\")";
pub const PHONE_OUT_OF_REACH: &str = "document.querySelector(\"body\").innerText.includes(\"Trying to reach phone\")";
pub const RIPE_SESSION: &str = "window.isRipeSession()";

// QR challenge flow
/// `false` here means the client state was never populated (TOS block).
pub const STORE_STATE: &str = "window.Store && window.Store.State";
pub const DEFAULT_STATE: &str = "!!(window.Store && window.Store.State && window.Store.State.Socket)";
/// `data-ref` of the challenge currently rendered, or `false`.
pub const FIRST_QR: &str = "document.querySelector(\"canvas[aria-label='Scan me!']\")?document.querySelector(\"canvas[aria-label='Scan me!']\").parentElement.getAttribute(\"data-ref\"):false";
pub const QR_RENDERER_READY: &str = "window.getQrPng || false";
pub const QR_PNG: &str = "window.getQrPng()";
pub const LAUNCH_RESULT: &str = "window.launchres";
/// Name of the binding the page posts challenges into.
pub const QR_BINDING: &str = "_smartQr";
pub const ROUTE_CHALLENGES: &str = "window['smartQr'] ? window['smartQr'](obj => window['_smartQr'](obj)) : false";
pub const QR_SUCCESS: &str = "QR_CODE_SUCCESS";
pub const MULTI_DEVICE_DETECTED: &str = "MULTI_DEVICE_DETECTED";

// Post-authentication
pub const DEBUG_EVENTS: &str = "debugEvents=true";
pub const CRITICAL_LISTENERS: &str = "window.critlis=true";
pub const VALID_SESSION: &str = "window.Store && window.Store.Msg ? true : false";
pub const STORE_KEYS: &str = "Object.keys(window.Store || {})";
pub const LOCAL_STORAGE: &str = "JSON.stringify(window.localStorage)";
pub const EARLY_ACCOUNT_ID: &str = "(localStorage[\"last-wid\"] || '').replace(/\"/g,\"\")";
pub const ACCOUNT_ID: &str = "(window.moi() || \"\").replace(/\"/g,\"\")";
pub const LAUNCH_METRICS: &str = "WAPI.launchMetrics()";
