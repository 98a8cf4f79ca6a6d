//! BLE UART adapter.
//!
//! Implements [`BlePort`] over the Bluedroid GATT server: one primary
//! service with the Nordic UART layout, connectable undirected
//! advertising, and notify fan-out to every connected peer.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw Bluedroid calls via `esp_idf_svc::sys`.
//! - **all other targets**: an in-memory peripheral driven by the test.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Props                |
//! |----------------|----------------------------------------|----------------------|
//! | RX             | `6e400002-b5a3-f393-e0a9-e50e24dcca9e` | Write, Write-NoRsp   |
//! | TX             | `6e400003-b5a3-f393-e0a9-e50e24dcca9e` | Notify (+CCCD)       |
//!
//! ## Callback context
//!
//! Bluedroid callbacks run in the BTC task.  They only touch the static
//! [`BleLink`] and the handle atomics below; connection bookkeeping, RX
//! buffering and the advertising-restart request all flow through the link.

use core::fmt;

use log::{info, warn};

use crate::app::ports::{BlePort, RadioError};
use crate::transport::ble_link::BleLink;

/// ATT payload bytes per notification before MTU exchange.
pub const DEFAULT_NOTIFY_PAYLOAD: usize = 20;

/// Default ATT MTU; the payload is three bytes shorter.
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Stack layers `start` brings up, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StackLayer {
    Controller,
    ControllerEnabled,
    Bluedroid,
    BluedroidEnabled,
}

impl StackLayer {
    pub const ALL: [Self; 4] = [
        Self::Controller,
        Self::ControllerEnabled,
        Self::Bluedroid,
        Self::BluedroidEnabled,
    ];
}

impl fmt::Display for StackLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller => write!(f, "bt_controller_init"),
            Self::ControllerEnabled => write!(f, "bt_controller_enable"),
            Self::Bluedroid => write!(f, "bluedroid_init"),
            Self::BluedroidEnabled => write!(f, "bluedroid_enable"),
        }
    }
}

/// Layers to take down, newest first, when bring-up got as far as
/// `reached`.
pub fn unwind_order(reached: Option<StackLayer>) -> impl Iterator<Item = StackLayer> {
    StackLayer::ALL
        .into_iter()
        .rev()
        .filter(move |layer| reached.is_some_and(|r| *layer <= r))
}

/// `ESP_ERR_INVALID_STATE`, as the simulated controller reports it.
#[cfg(not(target_os = "espidf"))]
const SIM_ERR_INVALID_STATE: i32 = 0x103;

/// Advertising interval in 0.625 ms controller units.
pub fn adv_interval_units(ms: u16) -> u16 {
    let units = u32::from(ms) * 1000 / 625;
    // Bluetooth range for connectable advertising: 20 ms .. 10.24 s.
    units.clamp(0x20, 0x4000) as u16
}

// ── ESP-IDF BLE static state (callback-safe atomics) ──────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures.  These statics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
use crate::transport::ble::{NUS_RX_UUID, NUS_SERVICE_UUID, NUS_TX_UUID};
#[cfg(target_os = "espidf")]
use crate::transport::ble_link::MAX_CONNECTIONS;

#[cfg(target_os = "espidf")]
static BLE_LINK: BleLink = BleLink::new();

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TX_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TX_CCCD_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_RX_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_ADV_UNITS: AtomicU32 = AtomicU32::new(0x1E0);

/// Negotiated MTU per peer, packed as `conn_id << 16 | mtu`.
#[cfg(target_os = "espidf")]
static BLE_PEER_MTU: [AtomicU32; MAX_CONNECTIONS] =
    [const { AtomicU32::new(u32::MAX) }; MAX_CONNECTIONS];

#[cfg(target_os = "espidf")]
const LOCAL_MTU: u16 = 247;

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
fn adv_params() -> esp_idf_svc::sys::esp_ble_adv_params_t {
    use esp_idf_svc::sys::*;
    let units = BLE_ADV_UNITS.load(AtomicOrdering::Relaxed) as u16;
    esp_ble_adv_params_t {
        adv_int_min: units,
        adv_int_max: units,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    }
}

#[cfg(target_os = "espidf")]
fn store_peer_mtu(conn_id: u16, mtu: u16) {
    let packed = (u32::from(conn_id) << 16) | u32::from(mtu);
    for slot in &BLE_PEER_MTU {
        let cur = slot.load(AtomicOrdering::Relaxed);
        if cur == u32::MAX || (cur >> 16) as u16 == conn_id {
            slot.store(packed, AtomicOrdering::Relaxed);
            return;
        }
    }
}

#[cfg(target_os = "espidf")]
fn forget_peer_mtu(conn_id: u16) {
    for slot in &BLE_PEER_MTU {
        let cur = slot.load(AtomicOrdering::Relaxed);
        if cur != u32::MAX && (cur >> 16) as u16 == conn_id {
            slot.store(u32::MAX, AtomicOrdering::Relaxed);
        }
    }
}

#[cfg(target_os = "espidf")]
fn notify_payload_max(conn_id: u16) -> usize {
    BLE_PEER_MTU
        .iter()
        .map(|s| s.load(AtomicOrdering::Relaxed))
        .find(|&v| v != u32::MAX && (v >> 16) as u16 == conn_id)
        .map(|v| usize::from(v as u16).saturating_sub(3))
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_NOTIFY_PAYLOAD)
}

#[cfg(target_os = "espidf")]
fn esp_check(ret: esp_idf_svc::sys::esp_err_t, what: &str) -> Result<(), RadioError> {
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        log::error!("BLE: {} failed ({})", what, ret);
        return Err(RadioError::Driver(ret));
    }
    Ok(())
}

/// Controller and Bluedroid up, callbacks registered, advertising data set.
/// `reached` tracks the last layer that came up so a failure can be
/// unwound by [`take_down_stack`].
///
/// # Safety
/// Main context only, with no stack running.
#[cfg(target_os = "espidf")]
unsafe fn bring_up_stack(
    reached: &mut Option<StackLayer>,
    name: &std::ffi::CStr,
    adv: &mut [u8],
) -> Result<(), RadioError> {
    use esp_idf_svc::sys::*;

    unsafe {
        // Classic BT memory is released once; later calls just fail.
        esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

        let mut bt_cfg = esp_bt_controller_config_t::default();
        for layer in StackLayer::ALL {
            let ret = match layer {
                StackLayer::Controller => esp_bt_controller_init(&mut bt_cfg),
                StackLayer::ControllerEnabled => {
                    esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE)
                }
                StackLayer::Bluedroid => esp_bluedroid_init(),
                StackLayer::BluedroidEnabled => esp_bluedroid_enable(),
            };
            esp_check(ret, &layer.to_string())?;
            *reached = Some(layer);
        }

        // Registrations live inside Bluedroid and go with it.
        esp_check(esp_ble_gap_register_callback(Some(ble_gap_event_handler)), "gap_register")?;
        esp_check(esp_ble_gatts_register_callback(Some(ble_gatts_event_handler)), "gatts_register")?;
        esp_check(esp_ble_gatts_app_register(0), "gatts_app_register")?;
        let _ = esp_ble_gatt_set_local_mtu(LOCAL_MTU);

        esp_check(esp_ble_gap_set_device_name(name.as_ptr()), "set_device_name")?;
        // Advertising starts from the GAP callback once the data is set.
        esp_check(
            esp_ble_gap_config_adv_data_raw(adv.as_mut_ptr(), adv.len() as u32),
            "config_adv_data_raw",
        )?;
    }
    Ok(())
}

/// Undo [`bring_up_stack`] from `reached` downwards.
///
/// # Safety
/// Main context only.
#[cfg(target_os = "espidf")]
unsafe fn take_down_stack(reached: Option<StackLayer>) {
    use esp_idf_svc::sys::*;

    for layer in unwind_order(reached) {
        let ret = unsafe {
            match layer {
                StackLayer::BluedroidEnabled => esp_bluedroid_disable(),
                StackLayer::Bluedroid => esp_bluedroid_deinit(),
                StackLayer::ControllerEnabled => esp_bt_controller_disable(),
                StackLayer::Controller => esp_bt_controller_deinit(),
            }
        };
        if ret != ESP_OK as i32 {
            warn!("BLE: undoing {} returned {}", layer, ret);
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_RAW_SET_COMPLETE_EVT => {
            let mut params = adv_params();
            unsafe { esp_ble_gap_start_advertising(&mut params) };
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::debug!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::debug!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            BLE_GATTS_IF.store(u32::from(gatts_if), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(NUS_SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // service + 2 × (decl + value) + CCCD
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(u32::from(svc_handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            unsafe { esp_ble_gatts_start_service(svc_handle) };
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            unsafe {
                add_gatt_char(
                    svc_handle,
                    NUS_TX_UUID,
                    ESP_GATT_PERM_READ,
                    ESP_GATT_CHAR_PROP_BIT_NOTIFY,
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) {
                1 => {
                    BLE_TX_CHAR_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: TX char (handle={})", handle);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    let mut cccd = uuid16_to_esp(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            svc_handle,
                            &mut cccd,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                }
                3 => {
                    BLE_RX_CHAR_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(4, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: RX char (handle={}), service ready", handle);
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let handle = unsafe { (*param).add_char_descr.attr_handle };
            BLE_TX_CCCD_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
            BLE_CHAR_STEP.store(3, AtomicOrdering::Relaxed);
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            unsafe {
                add_gatt_char(
                    svc_handle,
                    NUS_RX_UUID,
                    ESP_GATT_PERM_WRITE,
                    ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR,
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            if BLE_LINK.on_connect(conn_id) {
                log::info!("BLE GATTS: peer connected (conn_id={})", conn_id);
                // Bluedroid stops advertising on connect.
                if BLE_LINK.connections().len() < MAX_CONNECTIONS {
                    BLE_LINK.request_readvertise();
                }
            } else {
                log::warn!("BLE GATTS: peer rejected, all slots in use");
                unsafe { esp_ble_gatts_close(gatts_if, conn_id) };
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            let conn_id = unsafe { (*param).disconnect.conn_id };
            forget_peer_mtu(conn_id);
            BLE_LINK.on_disconnect(conn_id);
            log::info!("BLE GATTS: peer disconnected (conn_id={})", conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            let p = unsafe { &(*param).mtu };
            store_peer_mtu(p.conn_id, p.mtu);
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            let handle = u32::from(p.handle);
            if handle == BLE_RX_CHAR_HANDLE.load(AtomicOrdering::Relaxed) && !p.value.is_null() {
                let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };
                BLE_LINK.on_rx_write(data);
            }
            if p.need_rsp {
                unsafe {
                    esp_ble_gatts_send_response(
                        gatts_if,
                        p.conn_id,
                        p.trans_id,
                        esp_gatt_status_t_ESP_GATT_OK,
                        core::ptr::null_mut(),
                    );
                }
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    running: bool,
    #[cfg(not(target_os = "espidf"))]
    link: BleLink,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_at: Option<StackLayer>,
    #[cfg(not(target_os = "espidf"))]
    sim_layers: Option<StackLayer>,
    #[cfg(not(target_os = "espidf"))]
    sim_unwound: Vec<StackLayer>,
    #[cfg(not(target_os = "espidf"))]
    sim_mtu: u16,
    #[cfg(not(target_os = "espidf"))]
    sim_adv_units: u16,
    #[cfg(not(target_os = "espidf"))]
    sim_adv_data: heapless::Vec<u8, 31>,
    #[cfg(not(target_os = "espidf"))]
    sim_adv_restarts: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_notifications: Vec<(u16, Vec<u8>)>,
}

impl Default for BleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BleAdapter {
    pub fn new() -> Self {
        Self {
            running: false,
            #[cfg(not(target_os = "espidf"))]
            link: BleLink::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_fail_at: None,
            #[cfg(not(target_os = "espidf"))]
            sim_layers: None,
            #[cfg(not(target_os = "espidf"))]
            sim_unwound: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_mtu: DEFAULT_ATT_MTU,
            #[cfg(not(target_os = "espidf"))]
            sim_adv_units: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_adv_data: heapless::Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_adv_restarts: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_notifications: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: make `start` fail like a missing controller.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_fail_start(&mut self, fail: bool) {
        self.sim_fail_at = fail.then_some(StackLayer::Controller);
    }

    /// Simulation: make `start` fail when bringing up `layer`.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_fail_at(&mut self, layer: Option<StackLayer>) {
        self.sim_fail_at = layer;
    }

    /// Simulation: the ATT MTU every peer negotiated.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_mtu(&mut self, mtu: u16) {
        self.sim_mtu = mtu;
    }

    /// Simulation: layers taken down so far, in teardown order.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_unwound(&self) -> &[StackLayer] {
        &self.sim_unwound
    }

    /// Simulation: highest layer currently up.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_layers(&self) -> Option<StackLayer> {
        self.sim_layers
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_take_down(&mut self) {
        let reached = self.sim_layers.take();
        self.sim_unwound.extend(unwind_order(reached));
    }

    /// Simulation: a central connects.  Mirrors the GATTS connect callback.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect(&self, conn_id: u16) -> bool {
        self.running && self.link.on_connect(conn_id)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_disconnect(&self, conn_id: u16) {
        self.link.on_disconnect(conn_id);
    }

    /// Simulation: a central writes to RX.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write(&self, data: &[u8]) {
        if self.running {
            self.link.on_rx_write(data);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_notifications(&self) -> &[(u16, Vec<u8>)] {
        &self.sim_notifications
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_adv_units(&self) -> u16 {
        self.sim_adv_units
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_adv_data(&self) -> &[u8] {
        &self.sim_adv_data
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_adv_restarts(&self) -> u32 {
        self.sim_adv_restarts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(
        &mut self,
        name: &str,
        adv_interval_ms: u16,
        adv_data: &[u8],
    ) -> Result<(), RadioError> {
        BLE_ADV_UNITS.store(u32::from(adv_interval_units(adv_interval_ms)), AtomicOrdering::Relaxed);
        BLE_CHAR_STEP.store(0, AtomicOrdering::Relaxed);
        BLE_TX_CHAR_HANDLE.store(0, AtomicOrdering::Relaxed);
        BLE_RX_CHAR_HANDLE.store(0, AtomicOrdering::Relaxed);
        for slot in &BLE_PEER_MTU {
            slot.store(u32::MAX, AtomicOrdering::Relaxed);
        }

        let c_name = std::ffi::CString::new(name).map_err(|_| RadioError::Unavailable)?;
        let mut adv = heapless::Vec::<u8, 31>::new();
        adv.extend_from_slice(adv_data)
            .map_err(|_| RadioError::Unavailable)?;

        let mut reached = None;
        // SAFETY: main context, the stack is down (`running` is false).
        if let Err(e) = unsafe { bring_up_stack(&mut reached, &c_name, &mut adv) } {
            warn!("BLE: start failed, taking down partial stack");
            // SAFETY: only layers that came up are taken down.
            unsafe { take_down_stack(reached) };
            return Err(e);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(
        &mut self,
        name: &str,
        adv_interval_ms: u16,
        adv_data: &[u8],
    ) -> Result<(), RadioError> {
        if self.sim_layers.is_some() {
            // A controller left initialised refuses a second init.
            return Err(RadioError::Driver(SIM_ERR_INVALID_STATE));
        }
        self.sim_adv_data.clear();
        self.sim_adv_data
            .extend_from_slice(adv_data)
            .map_err(|_| RadioError::Unavailable)?;
        for layer in StackLayer::ALL {
            if self.sim_fail_at == Some(layer) {
                warn!("BLE(sim): {} failed, taking down partial stack", layer);
                self.sim_take_down();
                return Err(RadioError::Unavailable);
            }
            self.sim_layers = Some(layer);
        }
        self.sim_adv_units = adv_interval_units(adv_interval_ms);
        info!("BLE(sim): advertising '{}'", name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_restart_advertising(&mut self) -> Result<(), RadioError> {
        let mut params = adv_params();
        let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_start_advertising(&mut params) };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(RadioError::Driver(ret));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_restart_advertising(&mut self) -> Result<(), RadioError> {
        self.sim_adv_restarts += 1;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, conn_handle: u16, data: &[u8]) -> Result<(), RadioError> {
        use esp_idf_svc::sys::*;
        let handle = BLE_TX_CHAR_HANDLE.load(AtomicOrdering::Relaxed) as u16;
        if handle == 0 {
            return Err(RadioError::Unavailable);
        }
        let gatts_if = BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as esp_gatt_if_t;
        // SAFETY: `data` outlives the call; Bluedroid copies it.
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                gatts_if,
                conn_handle,
                handle,
                data.len() as u16,
                data.as_ptr() as *mut u8,
                false,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(RadioError::Driver(ret));
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn payload_max(&self, conn_handle: u16) -> usize {
        notify_payload_max(conn_handle)
    }

    #[cfg(not(target_os = "espidf"))]
    fn payload_max(&self, _conn_handle: u16) -> usize {
        usize::from(self.sim_mtu.saturating_sub(3)).max(1)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, conn_handle: u16, data: &[u8]) -> Result<(), RadioError> {
        self.sim_notifications.push((conn_handle, data.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_shutdown(&mut self) {
        use esp_idf_svc::sys::*;
        // SAFETY: main context, the stack is fully up (`running` is true).
        unsafe {
            esp_ble_gap_stop_advertising();
            take_down_stack(Some(StackLayer::BluedroidEnabled));
        }
        BLE_TX_CHAR_HANDLE.store(0, AtomicOrdering::Relaxed);
        BLE_RX_CHAR_HANDLE.store(0, AtomicOrdering::Relaxed);
        info!("BLE(espidf): stack shut down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_shutdown(&mut self) {
        self.sim_take_down();
        info!("BLE(sim): stopped");
    }
}

// ───────────────────────────────────────────────────────────────
// BlePort implementation
// ───────────────────────────────────────────────────────────────

impl BlePort for BleAdapter {
    fn start(&mut self, name: &str, adv_interval_ms: u16, adv_data: &[u8]) -> Result<(), RadioError> {
        if self.running {
            return Ok(());
        }
        self.platform_start(name, adv_interval_ms, adv_data)?;
        self.running = true;
        Ok(())
    }

    fn restart_advertising(&mut self) -> Result<(), RadioError> {
        if !self.running {
            return Err(RadioError::Unavailable);
        }
        self.platform_restart_advertising()
    }

    fn notify(&mut self, conn_handle: u16, data: &[u8]) -> Result<(), RadioError> {
        if !self.running {
            return Err(RadioError::Unavailable);
        }
        if !self.link().connections().contains(&conn_handle) {
            return Err(RadioError::NotConnected);
        }
        // One JSON document per notification: never split across several.
        let max = self.payload_max(conn_handle);
        if data.len() > max {
            warn!(
                "BLE: {} byte notification exceeds peer {} payload of {}, skipped",
                data.len(),
                conn_handle,
                max
            );
            return Err(RadioError::PayloadTooLarge(data.len()));
        }
        self.platform_notify(conn_handle, data)
    }

    fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.platform_shutdown();
        self.running = false;
        self.link().reset();
    }

    #[cfg(target_os = "espidf")]
    fn link(&self) -> &BleLink {
        &BLE_LINK
    }

    #[cfg(not(target_os = "espidf"))]
    fn link(&self) -> &BleLink {
        &self.link
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
