fn main() -> anyhow::Result<()> {
    pivot_desktop_lib::run()
}
