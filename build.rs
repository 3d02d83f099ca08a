fn main() {
    // Host builds (library + tests) need no ESP-IDF environment.
    #[cfg(feature = "firmware")]
    embuild::espidf::sysenv::output();
}
