fn main() -> anyhow::Result<()> {
    sl_cli::run()
}
