//! Injected markup and scripts
//!
//! Everything here ships verbatim into downleveled pages, after scripts were
//! transpiled, so it is written as plain ES5 and avoids the substrings the
//! keyword obfuscation table guards.

use crate::config::TargetProfile;

/// Runtime fallbacks prepended to `<head>` after the polyfill bundles
pub const RUNTIME_SHIM: &str = concat!(
    "(function(){",
    "if(typeof window.structuredClone!=='function'){window.structuredClone=function(v){return v===undefined?undefined:JSON.parse(JSON.stringify(v))}}",
    "window.open=function(u){if(u){window.location.href=u}return null};",
    "function at(n){n=Number(n)||0;n=n<0?Math.ceil(n):Math.floor(n);if(n<0){n+=this.length}if(n<0||n>=this.length){return undefined}return this[n]}",
    "if(!Array.prototype.at){Array.prototype.at=at}",
    "if(!String.prototype.at){String.prototype.at=at}",
    "var P=window['Prom'+'ise'];",
    "if(P&&!P.any){P.any=function(list){return new P(function(res,rej){var items=Array.prototype.slice.call(list);var left=items.length;var errors=[];",
    "if(!left){rej(new Error('All rejected'));return}",
    "for(var i=0;i<items.length;i++){(function(i){P.resolve(items[i]).then(res,function(e){errors[i]=e;left-=1;if(!left){var err=new Error('All rejected');err.errors=errors;rej(err)}})})(i)}",
    "})}}",
    "})();"
);

const MODAL_STYLE: &str = "display:none;position:fixed;left:10%;top:20%;width:80%;padding:16px;background:#fff;color:#000;border:2px solid #000;z-index:9999";

/// Build-variant marker inserted after the badge anchor
pub fn badge(profile: &TargetProfile) -> String {
    format!(
        "<span id=\"retro-badge\" role=\"button\" onclick=\"retroShowInfo()\" style=\"display:inline-block;margin-left:8px;padding:0 6px;border:1px solid currentColor;font-size:11px;cursor:pointer\">{}</span>",
        profile.id.as_str().to_uppercase()
    )
}

/// Info modal, gate warning modal and the gate helper script
pub fn modals(profile: &TargetProfile) -> String {
    let variant = profile.id.as_str().to_uppercase();
    let min = profile
        .min_browser
        .as_ref()
        .map_or_else(String::new, |m| format!(" It targets {}.", m.browsers));

    format!(
        concat!(
            "<div id=\"retro-info-modal\" style=\"{style}\">",
            "<p>This is the {variant} build of Retro OS, made for older browsers.{min}</p>",
            "<button onclick=\"retroHide('retro-info-modal')\">OK</button></div>",
            "<div id=\"retro-gate-modal\" style=\"{style}\">",
            "<p>This app needs features your browser may not support. Open it anyway?</p>",
            "<button onclick=\"retroGateContinue()\">Open</button> ",
            "<button onclick=\"retroHide('retro-gate-modal')\">Cancel</button></div>",
            "<script>{helper}</script>"
        ),
        style = MODAL_STYLE,
        variant = variant,
        min = min,
        helper = GATE_HELPER,
    )
}

/// Apps that open behind the gate warning
const GATE_HELPER: &str = concat!(
    "var RETRO_GATED_APPS=['paint','music','camera','terminal'];",
    "function retroIsGated(n){return RETRO_GATED_APPS.indexOf(n)!==-1}",
    "function retroShow(id){var m=document.getElementById(id);if(m){m.style.display='block'}}",
    "function retroHide(id){var m=document.getElementById(id);if(m){m.style.display='none'}}",
    "function retroShowInfo(){retroShow('retro-info-modal')}",
    "function retroGate(n){var m=document.getElementById('retro-gate-modal');if(!m){return true}m.setAttribute('data-app',n);retroShow('retro-gate-modal');return false}",
    "function retroGateContinue(){var m=document.getElementById('retro-gate-modal');var n=m?m.getAttribute('data-app'):null;retroHide('retro-gate-modal');if(n&&typeof openAppUngated==='function'){openAppUngated(n)}}"
);
