fn main() -> anyhow::Result<()> {
    video_orb::start()
}
