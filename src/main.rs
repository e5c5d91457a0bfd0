fn main() {
    if let Err(e) = terrainw::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
