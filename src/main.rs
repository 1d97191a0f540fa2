fn main() -> anyhow::Result<()> {
    statusboard::cli::run()
}
