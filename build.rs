fn main() {
    // Host-side test builds have no ESP-IDF toolchain to probe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
