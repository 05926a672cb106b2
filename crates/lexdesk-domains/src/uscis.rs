use std::collections::BTreeMap;

use lexdesk_core::forms::{FieldTarget, FormTemplate};

const FORMS_BASE: &str = "https://www.uscis.gov/sites/default/files/document/forms";

fn template(form_id: &str, title: &str, file: &str, fields: &[(&str, FieldTarget)]) -> FormTemplate {
    FormTemplate {
        form_id: form_id.into(),
        title: title.into(),
        pdf_url: format!("{FORMS_BASE}/{file}"),
        fields: fields
            .iter()
            .map(|(key, target)| (key.to_string(), target.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn d(field: &str) -> FieldTarget {
    FieldTarget::direct(field)
}

/// Petition for Alien Relative. Answers describe the beneficiary.
pub fn i130() -> FormTemplate {
    const P: &str = "form1[0].#subform[1]";
    template(
        "I-130",
        "Petition for Alien Relative",
        "i-130.pdf",
        &[
            (
                "fullName",
                FieldTarget::name_split(
                    format!("{P}.Pt4Line4b_GivenName[0]"),
                    format!("{P}.Pt4Line4c_MiddleName[0]"),
                    format!("{P}.Pt4Line4a_FamilyName[0]"),
                ),
            ),
            ("aNumber", d(&format!("{P}.Pt4Line1_AlienNumber[0]"))),
            ("dateOfBirth", d(&format!("{P}.Pt4Line9_DateOfBirth[0]"))),
            ("countryOfBirth", d(&format!("{P}.Pt4Line8_CountryOfBirth[0]"))),
            ("street", d(&format!("{P}.Pt4Line11_StreetNumberName[0]"))),
            ("city", d(&format!("{P}.Pt4Line11_CityOrTown[0]"))),
            ("state", d(&format!("{P}.Pt4Line11_State[0]"))),
            ("zip", d(&format!("{P}.Pt4Line11_ZipCode[0]"))),
            ("phone", d(&format!("{P}.Pt4Line14_DaytimePhoneNumber[0]"))),
            ("email", d(&format!("{P}.Pt4Line16_EmailAddress[0]"))),
        ],
    )
}

/// Application for Employment Authorization.
pub fn i765() -> FormTemplate {
    const P: &str = "form1[0].Page1[0]";
    template(
        "I-765",
        "Application for Employment Authorization",
        "i-765.pdf",
        &[
            (
                "fullName",
                FieldTarget::name_split(
                    format!("{P}.Line1b_GivenName[0]"),
                    format!("{P}.Line1c_MiddleName[0]"),
                    format!("{P}.Line1a_FamilyName[0]"),
                ),
            ),
            ("aNumber", d("form1[0].Page2[0].Line7_AlienNumber[0]")),
            ("ssn", d("form1[0].Page2[0].Line12b_SSN[0]")),
            ("dateOfBirth", d("form1[0].Page3[0].Line19_DOB[0]")),
            ("countryOfBirth", d("form1[0].Page3[0].Line18c_CountryOfBirth[0]")),
            ("street", d("form1[0].Page2[0].Pt2Line5_StreetNumberName[0]")),
            ("city", d("form1[0].Page2[0].Pt2Line5_CityOrTown[0]")),
            ("state", d("form1[0].Page2[0].Pt2Line5_State[0]")),
            ("zip", d("form1[0].Page2[0].Pt2Line5_ZipCode[0]")),
            ("eligibilityCategory", d("form1[0].Page3[0].#area[1].section_1[0]")),
        ],
    )
}

/// Application for Naturalization.
pub fn n400() -> FormTemplate {
    const P: &str = "form1[0].#subform[0]";
    template(
        "N-400",
        "Application for Naturalization",
        "n-400.pdf",
        &[
            (
                "fullName",
                FieldTarget::name_split(
                    format!("{P}.P2_Line1_GivenName[0]"),
                    format!("{P}.P2_Line1_MiddleName[0]"),
                    format!("{P}.P2_Line1_FamilyName[0]"),
                ),
            ),
            ("aNumber", d(&format!("{P}.#area[0].Line1_AlienNumber[0]"))),
            ("dateOfBirth", d("form1[0].#subform[1].P2_Line8_DateOfBirth[0]")),
            ("residentSince", d("form1[0].#subform[1].P2_Line9_DateBecamePermanentResident[0]")),
            ("countryOfBirth", d("form1[0].#subform[1].P2_Line10_CountryOfBirth[0]")),
            ("ssn", d("form1[0].#subform[1].Line12b_SSN[0]")),
            ("phone", d("form1[0].#subform[2].P12_Line3_Telephone[0]")),
            ("email", d("form1[0].#subform[2].P12_Line5_Email[0]")),
        ],
    )
}

pub fn builtin_forms() -> Vec<FormTemplate> {
    vec![i130(), i765(), n400()]
}
