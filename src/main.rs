fn main() -> anyhow::Result<()> {
    scoutdb::cli::run()
}
