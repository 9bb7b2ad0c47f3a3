use passcan::extract_passport_data;

fn main() {
    println!("Field Extraction Demo");
    println!("---------------------");

    let transcript = "\
PASSPORT
Passport No: X4821907
Name: JOHN MICHAEL DOE
NATIONALITY: USA
Place of Birth: WELLINGTON
Sex: M
Date of Birth: 12/06/1985
Date of Expiry: 14/03/2030
Date of Issue: 15/03/2020
Authority: DEPARTMENT OF INTERNAL AFFAIRS
";

    println!("\nRunning the extractor over a sample transcript...");
    let data = extract_passport_data(transcript);

    println!("\nEXTRACTED FIELDS:");
    for (name, value) in data.fields() {
        println!(
            "  {:<34}{}",
            format!("{}:", name.replace('_', " ")),
            value.unwrap_or("-")
        );
    }
    println!(
        "\n{} of {} fields populated.",
        data.filled_count(),
        data.fields().len()
    );
}
