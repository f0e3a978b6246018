fn main() -> std::process::ExitCode {
    aperture_client::app::run()
}
